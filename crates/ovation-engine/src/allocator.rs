//! Member-id allocation.
//!
//! Read the class's high-water mark, increment, and hand the candidate to
//! the registry, whose insert is guarded by the storage-level uniqueness
//! constraint. The read-then-write is not atomic against concurrent
//! allocators; collisions come back as typed conflicts and the registry
//! retries with a fresh id. A failed high-water read degrades to a
//! timestamp-based id — worse to look at, but registration stays live.

use std::sync::Arc;

use chrono::Utc;
use ovation_core::{
  member::{MemberClass, MemberId},
  store::MemberStore,
};
use rand_core::{OsRng, RngCore as _};
use tracing::warn;

pub struct IdAllocator<M> {
  members: Arc<M>,
}

impl<M> Clone for IdAllocator<M> {
  fn clone(&self) -> Self {
    Self { members: Arc::clone(&self.members) }
  }
}

impl<M: MemberStore> IdAllocator<M> {
  pub fn new(members: Arc<M>) -> Self {
    Self { members }
  }

  /// The next candidate id for `class`.
  ///
  /// Never fails: a transport-level read failure falls back to a degraded
  /// id (class prefix + epoch seconds + random component), logged as a
  /// warning so the loss of readable sequencing is observable.
  pub async fn next(&self, class: MemberClass) -> MemberId {
    match self.members.highest_sequential_id(class).await {
      Ok(highest) => {
        let sequence = highest.and_then(|id| id.sequence()).map_or(1, |n| n + 1);
        MemberId::sequential(class, sequence)
      }
      Err(error) => {
        warn!(%class, %error, "member-id sequence read failed; minting degraded id");
        MemberId::degraded(class, Utc::now().timestamp(), OsRng.next_u32())
      }
    }
  }
}
