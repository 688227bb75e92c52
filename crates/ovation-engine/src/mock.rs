//! Scripted identity provider shared by the engine's test modules.

use std::{
  collections::VecDeque,
  sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
  },
};

use ovation_core::{
  identity::{AuthSubject, OauthKind},
  member::{Email, PhoneNumber},
  provider::{IdentityProvider, OtpCheck},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("mock provider failure: {0}")]
pub struct MockProviderError(pub String);

/// An [`IdentityProvider`] whose `get_session` answers come from a script.
/// Once the script runs dry, the configured steady-state session is returned.
pub struct MockProvider {
  session_script: Mutex<VecDeque<Result<Option<AuthSubject>, String>>>,
  steady_session: Mutex<Option<AuthSubject>>,
  sign_outs:      AtomicUsize,
  otp_sends:      AtomicUsize,
  otp_check:      Mutex<OtpCheck>,
}

impl MockProvider {
  pub fn new() -> Self {
    Self {
      session_script: Mutex::new(VecDeque::new()),
      steady_session: Mutex::new(None),
      sign_outs:      AtomicUsize::new(0),
      otp_sends:      AtomicUsize::new(0),
      otp_check:      Mutex::new(OtpCheck::Verified),
    }
  }

  /// Queue one `get_session` answer ahead of the steady state.
  pub fn script_session(&self, step: Result<Option<AuthSubject>, &str>) {
    self
      .session_script
      .lock()
      .unwrap()
      .push_back(step.map_err(str::to_owned));
  }

  /// The answer `get_session` gives once the script is exhausted.
  pub fn set_steady_session(&self, session: Option<AuthSubject>) {
    *self.steady_session.lock().unwrap() = session;
  }

  pub fn set_otp_check(&self, check: OtpCheck) {
    *self.otp_check.lock().unwrap() = check;
  }

  pub fn sign_outs(&self) -> usize {
    self.sign_outs.load(Ordering::SeqCst)
  }

  pub fn otp_sends(&self) -> usize {
    self.otp_sends.load(Ordering::SeqCst)
  }
}

impl IdentityProvider for MockProvider {
  type Error = MockProviderError;

  async fn sign_in_with_password(
    &self,
    _: &Email,
    _: &str,
  ) -> Result<AuthSubject, MockProviderError> {
    unimplemented!()
  }

  async fn sign_up(&self, _: &Email, _: &str) -> Result<AuthSubject, MockProviderError> {
    unimplemented!()
  }

  async fn sign_in_with_oauth(&self, _: OauthKind) -> Result<String, MockProviderError> {
    unimplemented!()
  }

  async fn get_session(&self) -> Result<Option<AuthSubject>, MockProviderError> {
    if let Some(step) = self.session_script.lock().unwrap().pop_front() {
      return step.map_err(MockProviderError);
    }
    Ok(self.steady_session.lock().unwrap().clone())
  }

  async fn sign_out(&self) -> Result<(), MockProviderError> {
    self.sign_outs.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }

  async fn send_phone_otp(&self, _: &PhoneNumber) -> Result<(), MockProviderError> {
    self.otp_sends.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }

  async fn check_phone_otp(
    &self,
    _: &PhoneNumber,
    _: &str,
  ) -> Result<OtpCheck, MockProviderError> {
    Ok(*self.otp_check.lock().unwrap())
  }
}
