//! The phone-OTP flow for anonymous voters.
//!
//! The provider owns code generation, delivery, and expiry; this state
//! machine owns sequencing. One flow instance belongs to one submission
//! attempt and allows one outstanding code at a time. A confirmation is
//! consumed by exactly one vote submission and never outlives it — voting
//! again tomorrow means verifying again, unless the voter is a member with a
//! phone number on file, in which case no flow is created at all.

use std::sync::Arc;

use ovation_core::{
  member::PhoneNumber,
  provider::{IdentityProvider, OtpCheck},
};
use thiserror::Error;

use crate::BoxError;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum OtpError {
  /// `verify` was called with no code outstanding.
  #[error("no code has been issued for this flow")]
  NoCodeIssued,

  /// `issue` was called while the flow still expects the previous code.
  #[error("a code is already outstanding for this flow")]
  CodeOutstanding,

  #[error("identity provider error: {0}")]
  Provider(#[source] BoxError),
}

// ─── State machine ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpState {
  Idle,
  CodeSent { phone: PhoneNumber },
  Confirmed { phone: PhoneNumber },
}

/// Per-submission OTP sequencing over an [`IdentityProvider`].
pub struct OtpFlow<P> {
  provider: Arc<P>,
  state:    OtpState,
}

impl<P: IdentityProvider> OtpFlow<P> {
  pub fn new(provider: Arc<P>) -> Self {
    Self { provider, state: OtpState::Idle }
  }

  pub fn state(&self) -> &OtpState { &self.state }

  /// Ask the provider to send a code to `phone`.
  ///
  /// Allowed from `Idle` and from `Confirmed` (a new submission restarts the
  /// flow); rejected while a code is still outstanding.
  pub async fn issue(&mut self, phone: PhoneNumber) -> Result<(), OtpError> {
    if matches!(self.state, OtpState::CodeSent { .. }) {
      return Err(OtpError::CodeOutstanding);
    }

    self
      .provider
      .send_phone_otp(&phone)
      .await
      .map_err(|e| OtpError::Provider(Box::new(e)))?;

    self.state = OtpState::CodeSent { phone };
    Ok(())
  }

  /// Check `code` against the outstanding issuance.
  ///
  /// `Verified` confirms the phone for this submission. `Expired` clears the
  /// outstanding code so a fresh one can be issued. `InvalidCode` leaves the
  /// code outstanding — the voter may simply have mistyped.
  pub async fn verify(&mut self, code: &str) -> Result<OtpCheck, OtpError> {
    let phone = match &self.state {
      OtpState::CodeSent { phone } => phone.clone(),
      _ => return Err(OtpError::NoCodeIssued),
    };

    let check = self
      .provider
      .check_phone_otp(&phone, code)
      .await
      .map_err(|e| OtpError::Provider(Box::new(e)))?;

    match check {
      OtpCheck::Verified => self.state = OtpState::Confirmed { phone },
      OtpCheck::Expired => self.state = OtpState::Idle,
      OtpCheck::InvalidCode => {}
    }

    Ok(check)
  }

  /// Hand the confirmed phone to a vote submission, consuming it. A second
  /// call returns `None`: one confirmation backs at most one vote.
  pub fn take_confirmation(&mut self) -> Option<PhoneNumber> {
    match std::mem::replace(&mut self.state, OtpState::Idle) {
      OtpState::Confirmed { phone } => Some(phone),
      other => {
        self.state = other;
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::mock::MockProvider;

  fn phone() -> PhoneNumber {
    PhoneNumber::new("090-1111-2222").unwrap()
  }

  #[tokio::test]
  async fn verify_before_issue_is_a_sequencing_error() {
    let provider = Arc::new(MockProvider::new());
    let mut flow = OtpFlow::new(provider);

    let err = flow.verify("123456").await.unwrap_err();
    assert!(matches!(err, OtpError::NoCodeIssued));
  }

  #[tokio::test]
  async fn second_issue_while_code_outstanding_is_rejected() {
    let provider = Arc::new(MockProvider::new());
    let mut flow = OtpFlow::new(Arc::clone(&provider));

    flow.issue(phone()).await.unwrap();
    let err = flow.issue(phone()).await.unwrap_err();
    assert!(matches!(err, OtpError::CodeOutstanding));
    assert_eq!(provider.otp_sends(), 1, "the provider saw only one send");
  }

  #[tokio::test]
  async fn verified_code_confirms_and_is_consumed_once() {
    let provider = Arc::new(MockProvider::new());
    let mut flow = OtpFlow::new(provider);

    flow.issue(phone()).await.unwrap();
    assert_eq!(flow.verify("123456").await.unwrap(), OtpCheck::Verified);

    assert_eq!(flow.take_confirmation(), Some(phone()));
    assert_eq!(flow.take_confirmation(), None);
  }

  #[tokio::test]
  async fn expired_code_is_reported_as_expired_and_allows_reissue() {
    let provider = Arc::new(MockProvider::new());
    provider.set_otp_check(OtpCheck::Expired);
    let mut flow = OtpFlow::new(Arc::clone(&provider));

    flow.issue(phone()).await.unwrap();
    assert_eq!(flow.verify("123456").await.unwrap(), OtpCheck::Expired);
    assert_eq!(flow.take_confirmation(), None);

    // The dead code no longer blocks a fresh issuance.
    provider.set_otp_check(OtpCheck::Verified);
    flow.issue(phone()).await.unwrap();
    assert_eq!(flow.verify("654321").await.unwrap(), OtpCheck::Verified);
  }

  #[tokio::test]
  async fn invalid_code_keeps_the_issuance_outstanding() {
    let provider = Arc::new(MockProvider::new());
    provider.set_otp_check(OtpCheck::InvalidCode);
    let mut flow = OtpFlow::new(Arc::clone(&provider));

    flow.issue(phone()).await.unwrap();
    assert_eq!(flow.verify("000000").await.unwrap(), OtpCheck::InvalidCode);

    // Still outstanding: no new issue, but a corrected code goes through.
    assert!(matches!(flow.issue(phone()).await, Err(OtpError::CodeOutstanding)));
    provider.set_otp_check(OtpCheck::Verified);
    assert_eq!(flow.verify("123456").await.unwrap(), OtpCheck::Verified);
  }
}
