//! HTTP adapter for the hosted identity service.
//!
//! Implements [`ovation_core::provider::IdentityProvider`] against the
//! service's REST surface: password and delegated sign-in, session reads,
//! sign-out, and the phone-OTP channel. One adapter instance corresponds to
//! one client session; [`HttpIdentityProvider::with_access_token`] derives a
//! session-scoped instance from a request's bearer token.

mod provider;

pub mod error;

pub use error::{Error, Result};
pub use provider::{HttpIdentityProvider, ProviderConfig};
