//! The external identity provider seam.
//!
//! The hosted provider owns credentials, sessions, and the phone-OTP
//! channel; this system consumes it through this narrow surface and never
//! re-implements any of it. One provider instance corresponds to one client
//! session.

use std::future::Future;

use crate::{
  identity::{AuthSubject, OauthKind},
  member::{Email, PhoneNumber},
};

/// Result of checking a phone OTP code with the provider.
///
/// `Expired` and `InvalidCode` are distinct on purpose: the caller tells the
/// voter to request a new code in one case and to re-type it in the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
  Verified,
  InvalidCode,
  Expired,
}

/// Client surface of the hosted identity service.
pub trait IdentityProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn sign_in_with_password<'a>(
    &'a self,
    email: &'a Email,
    password: &'a str,
  ) -> impl Future<Output = Result<AuthSubject, Self::Error>> + Send + 'a;

  fn sign_up<'a>(
    &'a self,
    email: &'a Email,
    password: &'a str,
  ) -> impl Future<Output = Result<AuthSubject, Self::Error>> + Send + 'a;

  /// Begin a delegated sign-in. Returns the authorization URL the caller
  /// redirects the browser to; the resulting session arrives later via
  /// [`get_session`](Self::get_session) or the auth event stream.
  fn sign_in_with_oauth(
    &self,
    service: OauthKind,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  /// The current session's subject, or `None` when signed out. Immediately
  /// after a delegated sign-in the provider may briefly report `None` even
  /// though the session exists; the session resolver's bounded probe covers
  /// that window.
  fn get_session(
    &self,
  ) -> impl Future<Output = Result<Option<AuthSubject>, Self::Error>> + Send + '_;

  fn sign_out(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Ask the provider to send a one-time code to `phone`.
  fn send_phone_otp<'a>(
    &'a self,
    phone: &'a PhoneNumber,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Check a code previously sent to `phone`. Code lifetime is the
  /// provider's policy; an out-of-lifetime code must come back as
  /// [`OtpCheck::Expired`], not [`OtpCheck::InvalidCode`].
  fn check_phone_otp<'a>(
    &'a self,
    phone: &'a PhoneNumber,
    code: &'a str,
  ) -> impl Future<Output = Result<OtpCheck, Self::Error>> + Send + 'a;
}
