//! Authentication subjects and the derived identity state.
//!
//! A subject is issued by the external identity provider and is not itself a
//! membership record. [`ResolvedIdentity`] is recomputed on every
//! authentication-state change; it is never stored.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::member::{Email, MemberProfile, PhoneNumber};

// ─── Subject ─────────────────────────────────────────────────────────────────

/// The delegated sign-in services the site federates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OauthKind {
  Google,
  Line,
}

/// How the subject authenticated with the external provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "service", rename_all = "snake_case")]
pub enum AuthProviderKind {
  /// Direct email + password credentials.
  Password,
  /// Delegated/federated sign-in.
  #[serde(rename = "oauth")]
  OAuth(OauthKind),
}

impl AuthProviderKind {
  pub fn is_delegated(self) -> bool { matches!(self, Self::OAuth(_)) }
}

/// External identity, read-only to this system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSubject {
  pub subject_id: Uuid,
  pub email:      Option<Email>,
  pub provider:   AuthProviderKind,
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// Authentication lifecycle events, mirroring the provider's change stream.
#[derive(Debug, Clone)]
pub enum AuthEvent {
  SignedIn(AuthSubject),
  SignedOut,
  TokenRefreshed(AuthSubject),
}

// ─── Resolved identity ───────────────────────────────────────────────────────

/// The single identity state every flow keys off. Derived, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResolvedIdentity {
  /// No session, or the session was torn down.
  Unauthenticated,
  /// A session exists but no profile does yet; registration must be
  /// completed before the subject is a member.
  PendingProfile(AuthSubject),
  /// A session backed by exactly one profile in exactly one class. A caller
  /// expecting the other class redirects; this is a valid state, not an
  /// error.
  Member(MemberProfile),
}

impl ResolvedIdentity {
  pub fn is_member(&self) -> bool { matches!(self, Self::Member(_)) }

  /// The external subject backing this identity, when one exists.
  pub fn subject_id(&self) -> Option<Uuid> {
    match self {
      Self::Unauthenticated => None,
      Self::PendingProfile(subject) => Some(subject.subject_id),
      Self::Member(profile) => Some(profile.subject_id()),
    }
  }

  /// The pre-verified phone number on file, present only for members.
  /// Voters without one go through the OTP flow.
  pub fn on_file_phone(&self) -> Option<&PhoneNumber> {
    match self {
      Self::Member(profile) => Some(profile.phone()),
      _ => None,
    }
  }
}
