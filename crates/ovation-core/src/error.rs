//! Error types for `ovation-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid phone number: {0:?}")]
  InvalidPhoneNumber(String),

  #[error("invalid email address: {0:?}")]
  InvalidEmail(String),

  #[error("invalid member id: {0:?}")]
  InvalidMemberId(String),

  #[error("invalid artist id: {0:?}")]
  InvalidArtistId(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
