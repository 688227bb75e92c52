//! [`HttpIdentityProvider`] — the REST client behind the provider trait.

use std::{sync::RwLock, time::Duration};

use ovation_core::{
  identity::{AuthProviderKind, AuthSubject, OauthKind},
  member::{Email, PhoneNumber},
  provider::{IdentityProvider, OtpCheck},
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Connection settings for the hosted identity service.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
  /// Base URL of the auth endpoint group, e.g.
  /// `https://project.example.com/auth/v1`.
  pub base_url: String,
  /// Publishable API key sent with every request.
  pub api_key:  String,
  /// International dialing prefix substituted for the leading `0` of the
  /// domestic numbers this system stores.
  #[serde(default = "default_phone_prefix")]
  pub phone_prefix: String,
}

fn default_phone_prefix() -> String { "+81".to_owned() }

// ─── Wire payloads ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UserPayload {
  id:           Uuid,
  email:        Option<String>,
  app_metadata: Option<AppMetadata>,
}

#[derive(Debug, Deserialize)]
struct AppMetadata {
  provider: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
  access_token: String,
  user:         UserPayload,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
  error_code:        Option<String>,
  msg:               Option<String>,
  error_description: Option<String>,
}

impl ErrorPayload {
  fn message(&self) -> String {
    self
      .msg
      .clone()
      .or_else(|| self.error_description.clone())
      .unwrap_or_else(|| "unspecified error".to_owned())
  }
}

// ─── Mapping helpers ─────────────────────────────────────────────────────────

/// Map the service's provider tag onto the closed provider kind. Unknown
/// tags read as direct credentials — the distinction only informs routing.
fn provider_kind(tag: Option<&str>) -> AuthProviderKind {
  match tag {
    Some("google") => AuthProviderKind::OAuth(OauthKind::Google),
    Some("line") => AuthProviderKind::OAuth(OauthKind::Line),
    _ => AuthProviderKind::Password,
  }
}

fn subject_from(user: UserPayload) -> AuthSubject {
  let email = match user.email.as_deref().map(Email::new) {
    Some(Ok(email)) => Some(email),
    Some(Err(_)) => {
      debug!(subject_id = %user.id, "ignoring malformed email on subject");
      None
    }
    None => None,
  };
  let provider =
    provider_kind(user.app_metadata.and_then(|m| m.provider).as_deref());
  AuthSubject { subject_id: user.id, email, provider }
}

fn oauth_service_tag(service: OauthKind) -> &'static str {
  match service {
    OauthKind::Google => "google",
    OauthKind::Line => "line",
  }
}

/// OTP verification failures come back as an error payload; only the
/// explicit expiry code means "request a new one", everything else means
/// "the code is wrong".
fn otp_check_from_error(payload: &ErrorPayload) -> OtpCheck {
  match payload.error_code.as_deref() {
    Some("otp_expired") => OtpCheck::Expired,
    _ => OtpCheck::InvalidCode,
  }
}

// ─── Provider ────────────────────────────────────────────────────────────────

/// REST client for the hosted identity service.
pub struct HttpIdentityProvider {
  http:         Client,
  config:       ProviderConfig,
  access_token: RwLock<Option<String>>,
}

impl HttpIdentityProvider {
  pub fn new(config: ProviderConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()?;
    Ok(Self { http, config, access_token: RwLock::new(None) })
  }

  /// A session-scoped instance carrying a caller-supplied bearer token,
  /// e.g. from an incoming request. Shares the underlying HTTP client.
  pub fn with_access_token(&self, token: &str) -> Self {
    Self {
      http:         self.http.clone(),
      config:       self.config.clone(),
      access_token: RwLock::new(Some(token.to_owned())),
    }
  }

  fn url(&self, path: &str) -> String {
    format!("{}{path}", self.config.base_url.trim_end_matches('/'))
  }

  fn token(&self) -> Option<String> {
    self.access_token.read().ok().and_then(|guard| (*guard).clone())
  }

  fn store_token(&self, token: Option<String>) {
    if let Ok(mut slot) = self.access_token.write() {
      *slot = token;
    }
  }

  /// The service's E.164 rendering of a stored domestic number.
  fn e164(&self, phone: &PhoneNumber) -> String {
    format!("{}{}", self.config.phone_prefix, &phone.as_str()[1..])
  }

  async fn service_error(&self, response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let message = match response.json::<ErrorPayload>().await {
      Ok(payload) => payload.message(),
      Err(_) => "unreadable error body".to_owned(),
    };
    Error::Service { status, message }
  }
}

impl IdentityProvider for HttpIdentityProvider {
  type Error = Error;

  async fn sign_in_with_password(
    &self,
    email: &Email,
    password: &str,
  ) -> Result<AuthSubject> {
    let response = self
      .http
      .post(self.url("/token?grant_type=password"))
      .header("apikey", &self.config.api_key)
      .json(&serde_json::json!({ "email": email.as_str(), "password": password }))
      .send()
      .await?;

    if !response.status().is_success() {
      return Err(self.service_error(response).await);
    }

    let token: TokenResponse = response
      .json()
      .await
      .map_err(|e| Error::Malformed(e.to_string()))?;
    self.store_token(Some(token.access_token));
    Ok(subject_from(token.user))
  }

  async fn sign_up(&self, email: &Email, password: &str) -> Result<AuthSubject> {
    let response = self
      .http
      .post(self.url("/signup"))
      .header("apikey", &self.config.api_key)
      .json(&serde_json::json!({ "email": email.as_str(), "password": password }))
      .send()
      .await?;

    if !response.status().is_success() {
      return Err(self.service_error(response).await);
    }

    // Depending on confirmation policy the service returns either a full
    // session or a bare user record.
    let body: serde_json::Value = response
      .json()
      .await
      .map_err(|e| Error::Malformed(e.to_string()))?;
    if body.get("access_token").is_some() {
      let token: TokenResponse = serde_json::from_value(body)
        .map_err(|e| Error::Malformed(e.to_string()))?;
      self.store_token(Some(token.access_token));
      Ok(subject_from(token.user))
    } else {
      let user: UserPayload = serde_json::from_value(body)
        .map_err(|e| Error::Malformed(e.to_string()))?;
      Ok(subject_from(user))
    }
  }

  async fn sign_in_with_oauth(&self, service: OauthKind) -> Result<String> {
    // No request is made here; the browser follows the authorization URL
    // and the session arrives on the redirect landing.
    Ok(format!(
      "{}?provider={}",
      self.url("/authorize"),
      oauth_service_tag(service)
    ))
  }

  async fn get_session(&self) -> Result<Option<AuthSubject>> {
    let Some(token) = self.token() else {
      return Ok(None);
    };

    let response = self
      .http
      .get(self.url("/user"))
      .header("apikey", &self.config.api_key)
      .bearer_auth(&token)
      .send()
      .await?;

    match response.status() {
      StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
      status if status.is_success() => {
        let user: UserPayload = response
          .json()
          .await
          .map_err(|e| Error::Malformed(e.to_string()))?;
        Ok(Some(subject_from(user)))
      }
      _ => Err(self.service_error(response).await),
    }
  }

  async fn sign_out(&self) -> Result<()> {
    let Some(token) = self.token() else {
      return Ok(());
    };

    let response = self
      .http
      .post(self.url("/logout"))
      .header("apikey", &self.config.api_key)
      .bearer_auth(&token)
      .send()
      .await?;
    self.store_token(None);

    // An already-dead session is a successful sign-out.
    if response.status().is_success()
      || response.status() == StatusCode::UNAUTHORIZED
    {
      Ok(())
    } else {
      Err(self.service_error(response).await)
    }
  }

  async fn send_phone_otp(&self, phone: &PhoneNumber) -> Result<()> {
    let response = self
      .http
      .post(self.url("/otp"))
      .header("apikey", &self.config.api_key)
      .json(&serde_json::json!({ "phone": self.e164(phone) }))
      .send()
      .await?;

    if response.status().is_success() {
      Ok(())
    } else {
      Err(self.service_error(response).await)
    }
  }

  async fn check_phone_otp(
    &self,
    phone: &PhoneNumber,
    code: &str,
  ) -> Result<OtpCheck> {
    let response = self
      .http
      .post(self.url("/verify"))
      .header("apikey", &self.config.api_key)
      .json(&serde_json::json!({
        "type":  "sms",
        "phone": self.e164(phone),
        "token": code,
      }))
      .send()
      .await?;

    let status = response.status();
    if status.is_success() {
      return Ok(OtpCheck::Verified);
    }

    // Rejections are part of the modeled flow, not transport errors.
    if status.is_client_error() {
      let payload = response
        .json::<ErrorPayload>()
        .await
        .unwrap_or(ErrorPayload {
          error_code:        None,
          msg:               None,
          error_description: None,
        });
      return Ok(otp_check_from_error(&payload));
    }

    Err(self.service_error(response).await)
  }
}
