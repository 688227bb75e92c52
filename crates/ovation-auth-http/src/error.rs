//! Error type for `ovation-auth-http`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http transport error: {0}")]
  Transport(#[from] reqwest::Error),

  /// The service answered with a non-success status that is not part of the
  /// modeled flow (e.g. bad credentials, revoked key).
  #[error("identity service error ({status}): {message}")]
  Service { status: u16, message: String },

  #[error("malformed identity service response: {0}")]
  Malformed(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
