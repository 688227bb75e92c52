//! Per-flow OTP state for the HTTP facade.
//!
//! In the browser the OTP flow lives inside one page's state; over HTTP it
//! spans two requests (issue, then verify-and-vote), so the facade parks
//! each [`OtpFlow`] under an opaque flow id between them. Entries are
//! independent — one per submission attempt, no cross-flow coupling — and
//! abandoned flows are pruned on the next issuance.

use std::{
  collections::HashMap,
  sync::Arc,
  time::{Duration, Instant},
};

use ovation_auth_http::HttpIdentityProvider;
use ovation_core::{member::PhoneNumber, provider::OtpCheck};
use ovation_engine::{OtpError, OtpFlow};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Abandoned flows older than this are dropped.
const FLOW_TTL: Duration = Duration::from_secs(10 * 60);

struct HubEntry {
  flow:       OtpFlow<HttpIdentityProvider>,
  created_at: Instant,
}

pub struct OtpHub {
  flows: Mutex<HashMap<Uuid, HubEntry>>,
}

impl OtpHub {
  pub fn new() -> Self {
    Self { flows: Mutex::new(HashMap::new()) }
  }

  /// Start a fresh flow: issue a code to `phone` and park the flow under a
  /// new id.
  pub async fn begin(
    &self,
    provider: Arc<HttpIdentityProvider>,
    phone: PhoneNumber,
  ) -> Result<Uuid, OtpError> {
    let mut flow = OtpFlow::new(provider);
    flow.issue(phone).await?;

    let id = Uuid::new_v4();
    let mut flows = self.flows.lock().await;
    flows.retain(|_, entry| entry.created_at.elapsed() < FLOW_TTL);
    flows.insert(id, HubEntry { flow, created_at: Instant::now() });
    Ok(id)
  }

  /// Check a code against the parked flow. `None` if the flow id is unknown
  /// or has been pruned.
  pub async fn verify(
    &self,
    id: Uuid,
    code: &str,
  ) -> Option<Result<OtpCheck, OtpError>> {
    let mut flows = self.flows.lock().await;
    let entry = flows.get_mut(&id)?;
    Some(entry.flow.verify(code).await)
  }

  /// Consume the flow's confirmation for a vote submission. The entry is
  /// removed once its confirmation is taken.
  pub async fn take_confirmation(&self, id: Uuid) -> Option<PhoneNumber> {
    let mut flows = self.flows.lock().await;
    let entry = flows.get_mut(&id)?;
    let phone = entry.flow.take_confirmation();
    if phone.is_some() {
      flows.remove(&id);
    }
    phone
  }
}

impl Default for OtpHub {
  fn default() -> Self {
    Self::new()
  }
}
