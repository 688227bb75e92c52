//! JSON facade over the Ovation engine.
//!
//! Exposes the three upward operations — identity resolution, profile
//! completion, and vote submission — plus the OTP round-trip the anonymous
//! voting path needs. Backed by any store implementing the three store
//! traits; authentication is delegated to the hosted identity service via
//! `ovation-auth-http`.

pub mod error;
pub mod hub;
pub mod identity;
pub mod profile;
pub mod vote;

use std::sync::Arc;

use axum::{
  Router,
  http::HeaderMap,
  routing::{get, post},
};
use ovation_auth_http::HttpIdentityProvider;
use ovation_core::{
  config::EngineConfig,
  store::{MemberStore, TallyStore, VoteStore},
};
use ovation_engine::{MemberRegistry, VoteLedger};
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use hub::OtpHub;

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub provider: Arc<HttpIdentityProvider>,
  pub registry: MemberRegistry<S>,
  pub ledger:   VoteLedger<S, S>,
  pub otp:      Arc<OtpHub>,
  pub engine:   EngineConfig,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      provider: Arc::clone(&self.provider),
      registry: self.registry.clone(),
      ledger:   self.ledger.clone(),
      otp:      Arc::clone(&self.otp),
      engine:   self.engine.clone(),
    }
  }
}

impl<S> AppState<S>
where
  S: MemberStore + VoteStore + TallyStore,
{
  pub fn new(
    provider: HttpIdentityProvider,
    store: Arc<S>,
    engine: EngineConfig,
  ) -> Self {
    Self {
      provider: Arc::new(provider),
      registry: MemberRegistry::new(Arc::clone(&store), engine.clone()),
      ledger:   VoteLedger::new(Arc::clone(&store), store, engine.clone()),
      otp:      Arc::new(OtpHub::new()),
      engine,
    }
  }
}

/// Build the API router for `state`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: MemberStore + VoteStore + TallyStore + 'static,
{
  Router::new()
    .route("/api/identity", get(identity::resolve::<S>))
    .route("/api/profile", post(profile::complete::<S>))
    .route("/api/otp", post(vote::otp_request::<S>))
    .route("/api/otp/verify", post(vote::otp_verify::<S>))
    .route("/api/votes/precheck", get(vote::precheck::<S>))
    .route("/api/votes", post(vote::submit::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// The bearer token on a request, if any.
pub(crate) fn bearer(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
}
