//! The aggregate tally updater.
//!
//! Advances the denormalized per-artist counter after a durable vote insert.
//! The primary path is the store's single-step atomic add. The fallback is a
//! plain read-modify-write: racy under true concurrency, accepted as
//! best-effort degradation because the vote ledger is the source of truth
//! and the tally can be rebuilt from it. Entering the fallback is logged at
//! `warn` so the weakened guarantee is observable.

use std::sync::Arc;

use ovation_core::{store::TallyStore, vote::ArtistId};
use thiserror::Error;
use tracing::{debug, warn};

use crate::BoxError;

#[derive(Debug, Error)]
pub enum TallyError {
  #[error("tally store error: {0}")]
  Store(#[source] BoxError),
}

/// Which path performed the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyPath {
  Atomic,
  Fallback,
}

pub struct TallyUpdater<T> {
  tallies: Arc<T>,
}

impl<T> Clone for TallyUpdater<T> {
  fn clone(&self) -> Self {
    Self { tallies: Arc::clone(&self.tallies) }
  }
}

impl<T: TallyStore> TallyUpdater<T> {
  pub fn new(tallies: Arc<T>) -> Self {
    Self { tallies }
  }

  /// Add `amount` to the artist's points.
  pub async fn apply(
    &self,
    artist_id: &ArtistId,
    amount: i64,
  ) -> Result<TallyPath, TallyError> {
    let path = match self.tallies.increment_points(artist_id, amount).await {
      Ok(()) => TallyPath::Atomic,
      Err(error) => {
        warn!(
          %artist_id,
          %error,
          "atomic tally increment failed; degrading to read-modify-write"
        );
        let current = self
          .tallies
          .read_points(artist_id)
          .await
          .map_err(|e| TallyError::Store(Box::new(e)))?;
        self
          .tallies
          .write_points(artist_id, current + amount)
          .await
          .map_err(|e| TallyError::Store(Box::new(e)))?;
        TallyPath::Fallback
      }
    };

    // Advisory read; never gates the submission that triggered the update.
    match self.tallies.read_points(artist_id).await {
      Ok(points) => debug!(%artist_id, points, "tally after update"),
      Err(error) => debug!(%artist_id, %error, "tally verification read failed"),
    }

    Ok(path)
  }
}
