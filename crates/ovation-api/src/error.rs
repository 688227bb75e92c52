//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! This is where typed engine outcomes become the small set of user-facing
//! failure categories. Internal transport errors collapse to one generic
//! retry prompt; their detail goes to the log, never to the client.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use ovation_engine::{BoxError, RegistryError, SessionError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("authentication required")]
  Unauthorized,

  #[error("already voted today")]
  AlreadyVoted,

  #[error("this email is already registered")]
  EmailRegistered,

  #[error("already registered")]
  ProfileExists,

  #[error("registration could not be completed, please retry")]
  RegistrationRetry,

  #[error("unknown verification flow")]
  UnknownFlow,

  #[error("{0}")]
  Validation(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("temporary error, please retry")]
  Internal(#[source] BoxError),
}

impl ApiError {
  pub fn from_session(error: SessionError) -> Self {
    match error {
      SessionError::Provider(e) | SessionError::Resolution(e) => Self::Internal(e),
    }
  }

  pub fn from_registry(error: RegistryError) -> Self {
    match error {
      RegistryError::EmailAlreadyRegistered => Self::EmailRegistered,
      RegistryError::ProfileAlreadyExists(_) => Self::ProfileExists,
      RegistryError::MissingEmail => {
        Self::Validation("an email address is required to register".to_owned())
      }
      RegistryError::AllocationExhausted { .. } => Self::RegistrationRetry,
      RegistryError::Store(e) => Self::Internal(e),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    if let ApiError::Internal(source) = &self {
      tracing::error!(error = %source, "request failed on an internal error");
    }

    let status = match &self {
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::AlreadyVoted
      | ApiError::EmailRegistered
      | ApiError::ProfileExists => StatusCode::CONFLICT,
      ApiError::RegistrationRetry => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::UnknownFlow => StatusCode::NOT_FOUND,
      ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
