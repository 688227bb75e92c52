//! The session resolver.
//!
//! Turns raw authentication lifecycle events into a single
//! [`ResolvedIdentity`] and publishes every change through a watch channel,
//! so dependents (vote modal, registration flow, routing) observe the same
//! state at the same time. One resolver instance belongs to one client
//! session; there is no cross-user state here.

use std::{sync::Arc, time::Instant};

use ovation_core::{
  config::EngineConfig,
  identity::{AuthEvent, AuthSubject, ResolvedIdentity},
  provider::IdentityProvider,
  retry::{Attempt, RetryError},
  store::MemberStore,
};
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::{BoxError, registry::MemberRegistry};

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SessionError {
  #[error("identity provider error: {0}")]
  Provider(#[source] BoxError),

  /// The registry lookup errored and its single retry did too. Distinct
  /// from "no profile": callers must not treat this as `Unauthenticated`.
  #[error("profile resolution failed: {0}")]
  Resolution(#[source] BoxError),
}

// ─── Echo suppression ────────────────────────────────────────────────────────

/// One locally initiated sign-out arms one of these. It is scoped to the
/// resolver instance and consumed by at most one echoed signed-out event, so
/// it cannot leak across unrelated flows the way a module-level flag would.
#[derive(Debug)]
struct EchoSuppression {
  issued_at: Instant,
}

impl EchoSuppression {
  fn new() -> Self {
    Self { issued_at: Instant::now() }
  }

  fn is_live(&self, ttl: std::time::Duration) -> bool {
    self.issued_at.elapsed() <= ttl
  }
}

// ─── Resolver ────────────────────────────────────────────────────────────────

pub struct SessionResolver<P, M> {
  provider:      Arc<P>,
  registry:      MemberRegistry<M>,
  config:        EngineConfig,
  identity_tx:   watch::Sender<ResolvedIdentity>,
  suppress_echo: Mutex<Option<EchoSuppression>>,
}

impl<P, M> SessionResolver<P, M>
where
  P: IdentityProvider,
  M: MemberStore,
{
  pub fn new(provider: Arc<P>, registry: MemberRegistry<M>, config: EngineConfig) -> Self {
    let (identity_tx, _) = watch::channel(ResolvedIdentity::Unauthenticated);
    Self {
      provider,
      registry,
      config,
      identity_tx,
      suppress_echo: Mutex::new(None),
    }
  }

  /// Subscribe to identity changes. The receiver immediately sees the
  /// current state.
  pub fn identity(&self) -> watch::Receiver<ResolvedIdentity> {
    self.identity_tx.subscribe()
  }

  pub fn current(&self) -> ResolvedIdentity {
    self.identity_tx.borrow().clone()
  }

  /// Resolve the identity on ordinary page entry: one session read, no
  /// waiting. A missing session is simply `Unauthenticated`.
  pub async fn resolve_cold_start(&self) -> Result<ResolvedIdentity, SessionError> {
    let session = self
      .provider
      .get_session()
      .await
      .map_err(|e| SessionError::Provider(Box::new(e)))?;

    match session {
      None => Ok(self.publish(ResolvedIdentity::Unauthenticated)),
      Some(subject) => {
        let identity = self.resolve_subject(subject).await?;
        Ok(self.publish(identity))
      }
    }
  }

  /// Resolve the identity after a delegated sign-in redirect.
  ///
  /// The provider may report the redirect as complete slightly before the
  /// session is readable, so the read is probed within a bounded window. On
  /// timeout the half-open session is signed out and the terminal state is
  /// `Unauthenticated` — never a stuck caller.
  pub async fn resolve_after_redirect(&self) -> Result<ResolvedIdentity, SessionError> {
    let probed: Result<AuthSubject, RetryError<std::convert::Infallible>> = self
      .config
      .probe_policy()
      .run(async |attempt| match self.provider.get_session().await {
        Ok(Some(subject)) => Attempt::Done(subject),
        Ok(None) => Attempt::Again,
        Err(error) => {
          debug!(attempt, %error, "session probe attempt failed");
          Attempt::Again
        }
      })
      .await;

    match probed {
      Ok(subject) => {
        let identity = self.resolve_subject(subject).await?;
        Ok(self.publish(identity))
      }
      Err(RetryError::Exhausted { attempts }) => {
        warn!(attempts, "session never became readable; forcing sign-out");
        *self.suppress_echo.lock().await = Some(EchoSuppression::new());
        if let Err(error) = self.provider.sign_out().await {
          warn!(%error, "forced sign-out failed; clearing local state anyway");
        }
        Ok(self.publish(ResolvedIdentity::Unauthenticated))
      }
      Err(RetryError::Terminal(never)) => match never {},
    }
  }

  /// Apply one provider lifecycle event.
  pub async fn handle_event(
    &self,
    event: AuthEvent,
  ) -> Result<ResolvedIdentity, SessionError> {
    match event {
      AuthEvent::SignedIn(subject) => {
        let identity = self.resolve_subject(subject).await?;
        Ok(self.publish(identity))
      }
      AuthEvent::TokenRefreshed(subject) => {
        // A refresh does not change who is signed in; re-resolve only when
        // the current state does not already cover this subject.
        if self.current().subject_id() == Some(subject.subject_id) {
          return Ok(self.current());
        }
        let identity = self.resolve_subject(subject).await?;
        Ok(self.publish(identity))
      }
      AuthEvent::SignedOut => {
        if self.take_live_suppression().await {
          debug!("ignoring echoed signed-out event after local sign-out");
          return Ok(self.current());
        }
        Ok(self.publish(ResolvedIdentity::Unauthenticated))
      }
    }
  }

  /// Locally initiated sign-out. The local state is cleared immediately;
  /// the provider's own signed-out notification, which arrives later on the
  /// event channel, is absorbed by the suppression token.
  pub async fn sign_out(&self) -> Result<(), SessionError> {
    *self.suppress_echo.lock().await = Some(EchoSuppression::new());
    self.publish(ResolvedIdentity::Unauthenticated);
    self
      .provider
      .sign_out()
      .await
      .map_err(|e| SessionError::Provider(Box::new(e)))
  }

  // ── Internals ─────────────────────────────────────────────────────────────

  async fn resolve_subject(
    &self,
    subject: AuthSubject,
  ) -> Result<ResolvedIdentity, SessionError> {
    let mut last_error = None;

    let looked_up = self
      .config
      .lookup_policy()
      .run(async |attempt| {
        match self.registry.lookup(subject.subject_id).await {
          Ok(profile) => Attempt::<_, std::convert::Infallible>::Done(profile),
          Err(error) => {
            debug!(attempt, %error, "registry lookup errored");
            last_error = Some(error);
            Attempt::Again
          }
        }
      })
      .await;

    match looked_up {
      Ok(Some(profile)) => {
        info!(member_id = %profile.member_id(), "resolved member session");
        Ok(ResolvedIdentity::Member(profile))
      }
      // Not found is a normal branch: credentials exist, registration does
      // not. The caller routes to profile completion.
      Ok(None) => Ok(ResolvedIdentity::PendingProfile(subject)),
      Err(RetryError::Exhausted { .. }) => {
        let source = last_error
          .map(|e| Box::new(e) as BoxError)
          .unwrap_or_else(|| "lookup retries exhausted".into());
        Err(SessionError::Resolution(source))
      }
      Err(RetryError::Terminal(never)) => match never {},
    }
  }

  fn publish(&self, identity: ResolvedIdentity) -> ResolvedIdentity {
    self.identity_tx.send_replace(identity.clone());
    identity
  }

  async fn take_live_suppression(&self) -> bool {
    match self.suppress_echo.lock().await.take() {
      Some(token) => token.is_live(self.config.signout_echo_ttl()),
      None => false,
    }
  }
}
