//! The vote ledger.
//!
//! Validates a submission against the resolved identity, inserts the vote,
//! and only then advances the tally. Daily uniqueness is enforced in two
//! layers on purpose: the advisory pre-check gives the UI immediate
//! feedback, and the storage constraint arbitrates the races the pre-check
//! cannot see — a second tab, a retried request, the seconds spent in the
//! OTP flow between check and insert.

use std::sync::Arc;

use chrono::Utc;
use ovation_core::{
  config::EngineConfig,
  identity::ResolvedIdentity,
  member::PhoneNumber,
  store::{TallyStore, VoteInsert, VoteStore},
  vote::{vote_day, ArtistId, NewVote, Vote},
};
use thiserror::Error;
use tracing::warn;

use crate::{BoxError, tally::TallyUpdater};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Rejections decided before the insert is attempted.
#[derive(Debug, Error)]
pub enum ValidationError {
  #[error("artist {0} does not exist")]
  UnknownArtist(ArtistId),

  #[error("artist {0} is not accepting votes")]
  ArtistInactive(ArtistId),

  /// The submitted number differs from the member's registered number. Not
  /// silently corrected: the mismatch may be a stale form or another
  /// person's phone.
  #[error("submitted phone does not match the registered number")]
  PhoneMismatch,

  /// Anonymous submissions must carry a phone confirmed by the OTP flow for
  /// this very submission.
  #[error("phone number has not been verified for this submission")]
  PhoneNotVerified,

  #[error("message exceeds {max} characters")]
  MessageTooLong { max: usize },
}

#[derive(Debug, Error)]
pub enum LedgerError {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("vote store error: {0}")]
  Store(#[source] BoxError),
}

// ─── Submission ──────────────────────────────────────────────────────────────

/// One vote submission as assembled by the caller.
#[derive(Debug, Clone)]
pub struct VoteRequest {
  pub artist_id:  ArtistId,
  pub phone:      PhoneNumber,
  pub voter_name: String,
  pub message:    Option<String>,
  /// The phone confirmed by [`crate::otp::OtpFlow::take_confirmation`] for
  /// this submission. `None` on the member fast path.
  pub otp_confirmation: Option<PhoneNumber>,
}

/// Outcome of a submission that reached the insert.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
  Accepted(Vote),
  /// The composite constraint rejected the insert: this identity already
  /// voted for this artist today.
  AlreadyVotedToday,
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

pub struct VoteLedger<V, T> {
  votes:  Arc<V>,
  tally:  TallyUpdater<T>,
  config: EngineConfig,
}

impl<V, T> Clone for VoteLedger<V, T> {
  fn clone(&self) -> Self {
    Self {
      votes:  Arc::clone(&self.votes),
      tally:  self.tally.clone(),
      config: self.config.clone(),
    }
  }
}

impl<V, T> VoteLedger<V, T>
where
  V: VoteStore,
  T: TallyStore,
{
  pub fn new(votes: Arc<V>, tallies: Arc<T>, config: EngineConfig) -> Self {
    Self { votes, tally: TallyUpdater::new(tallies), config }
  }

  /// Advisory: has this identity already voted for `artist_id` today?
  ///
  /// UI enablement only. The answer can go stale in the seconds before the
  /// insert; the storage constraint is the authority.
  pub async fn has_voted_today(
    &self,
    voter_key: &PhoneNumber,
    artist_id: &ArtistId,
  ) -> Result<bool, LedgerError> {
    let today = vote_day(Utc::now(), self.config.day_utc_offset_hours);
    self
      .votes
      .has_vote(voter_key, artist_id, today)
      .await
      .map_err(|e| LedgerError::Store(Box::new(e)))
  }

  /// Submit one vote for the given resolved identity.
  pub async fn submit(
    &self,
    identity: &ResolvedIdentity,
    request: VoteRequest,
  ) -> Result<SubmitOutcome, LedgerError> {
    // Voter phone reconciliation. Members with a number on file skip OTP
    // entirely; everyone else must present this submission's confirmation.
    let voter_key = match identity.on_file_phone() {
      Some(on_file) => {
        if &request.phone != on_file {
          return Err(ValidationError::PhoneMismatch.into());
        }
        request.phone.clone()
      }
      None => match &request.otp_confirmation {
        Some(confirmed) if confirmed == &request.phone => confirmed.clone(),
        _ => return Err(ValidationError::PhoneNotVerified.into()),
      },
    };

    let artist = self
      .votes
      .get_artist(&request.artist_id)
      .await
      .map_err(|e| LedgerError::Store(Box::new(e)))?
      .ok_or_else(|| ValidationError::UnknownArtist(request.artist_id.clone()))?;
    if !artist.is_active {
      return Err(ValidationError::ArtistInactive(request.artist_id.clone()).into());
    }

    if let Some(message) = &request.message {
      let max = self.config.message_max_chars;
      if message.chars().count() > max {
        return Err(ValidationError::MessageTooLong { max }.into());
      }
    }

    let new_vote = NewVote {
      artist_id:  request.artist_id,
      voter_key,
      subject_id: identity.subject_id(),
      voter_name: request.voter_name,
      message:    request.message,
      vote_date:  vote_day(Utc::now(), self.config.day_utc_offset_hours),
    };

    let inserted = self
      .votes
      .insert_vote(new_vote)
      .await
      .map_err(|e| LedgerError::Store(Box::new(e)))?;

    match inserted {
      VoteInsert::Duplicate => Ok(SubmitOutcome::AlreadyVotedToday),
      VoteInsert::Recorded(vote) => {
        // The vote row is durable; a tally failure is a soft warning. The
        // tally is a projection and can be rebuilt from the ledger.
        if let Err(error) =
          self.tally.apply(&vote.artist_id, self.config.vote_weight).await
        {
          warn!(
            vote_id = %vote.vote_id,
            artist_id = %vote.artist_id,
            %error,
            "vote recorded but tally update failed"
          );
        }
        Ok(SubmitOutcome::Accepted(vote))
      }
    }
  }
}
