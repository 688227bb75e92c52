//! Storage trait seams and their typed outcomes.
//!
//! The traits are implemented by storage backends (e.g.
//! `ovation-store-sqlite`). The engine crate depends on these abstractions,
//! not on any concrete backend.
//!
//! Conflicts are part of the success channel, not the error channel: a
//! duplicate member id or a duplicate daily vote is expected under
//! concurrency and is normal control flow for the caller. The associated
//! `Error` type carries transport failures only.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
  member::{Email, MemberClass, MemberId, MemberProfile, NewProfile, PhoneNumber},
  vote::{Artist, ArtistId, NewVote, Vote},
};

// ─── Typed write outcomes ────────────────────────────────────────────────────

/// Which uniqueness constraint a profile insert collided with.
///
/// The distinction matters: a `MemberId` collision is retried with a freshly
/// allocated id, while `Subject` and `Email` collisions are terminal — they
/// mean a profile (or a shadow of one) already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberConflict {
  MemberId,
  Subject,
  Email,
}

/// Outcome of [`MemberStore::insert_profile`].
#[derive(Debug, Clone)]
pub enum MemberInsert {
  Created(MemberProfile),
  Conflict(MemberConflict),
}

/// Outcome of [`VoteStore::insert_vote`]. `Duplicate` is the authoritative
/// "already voted today" signal; the advisory pre-check never is.
#[derive(Debug, Clone)]
pub enum VoteInsert {
  Recorded(Vote),
  Duplicate,
}

// ─── Member store ────────────────────────────────────────────────────────────

/// Keyed access to the two disjoint membership tables.
pub trait MemberStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Look up the profile for `subject_id` in one class. Returns `None` if
  /// the subject has no profile in that class.
  fn find_profile(
    &self,
    class: MemberClass,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Option<MemberProfile>, Self::Error>> + Send + '_;

  /// Which class, if any, already holds a profile with this email. Spans
  /// both tables; used to keep one natural person out of both classes.
  fn email_class<'a>(
    &'a self,
    email: &'a Email,
  ) -> impl Future<Output = Result<Option<MemberClass>, Self::Error>> + Send + 'a;

  /// Insert a profile. The store assigns `created_at`. All three uniqueness
  /// constraints (member id, subject, email) surface as
  /// [`MemberInsert::Conflict`], never as `Self::Error`.
  fn insert_profile(
    &self,
    record: NewProfile,
  ) -> impl Future<Output = Result<MemberInsert, Self::Error>> + Send + '_;

  /// The highest sequentially allocated id in `class`, ignoring degraded
  /// (timestamp-based) ids. `None` when the class is empty.
  fn highest_sequential_id(
    &self,
    class: MemberClass,
  ) -> impl Future<Output = Result<Option<MemberId>, Self::Error>> + Send + '_;
}

// ─── Vote store ──────────────────────────────────────────────────────────────

/// The vote ledger table plus the artist catalog it validates against.
pub trait VoteStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get_artist<'a>(
    &'a self,
    artist_id: &'a ArtistId,
  ) -> impl Future<Output = Result<Option<Artist>, Self::Error>> + Send + 'a;

  /// Insert a vote. The store assigns `vote_id` and `created_at`. The
  /// composite uniqueness constraint surfaces as [`VoteInsert::Duplicate`].
  fn insert_vote(
    &self,
    vote: NewVote,
  ) -> impl Future<Output = Result<VoteInsert, Self::Error>> + Send + '_;

  /// Advisory existence check for `(voter_key, artist_id, day)`. Inherently
  /// racy; UI feedback only, never enforcement.
  fn has_vote<'a>(
    &'a self,
    voter_key: &'a PhoneNumber,
    artist_id: &'a ArtistId,
    day: NaiveDate,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}

// ─── Tally store ─────────────────────────────────────────────────────────────

/// Primitives for the denormalized per-artist point counter.
pub trait TallyStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Single-step atomic add — the primary path.
  fn increment_points<'a>(
    &'a self,
    artist_id: &'a ArtistId,
    amount: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Plain read, for the fallback path and advisory verification. Absent
  /// rows read as zero.
  fn read_points<'a>(
    &'a self,
    artist_id: &'a ArtistId,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + 'a;

  /// Plain overwrite, for the fallback path only. Racy by nature; the
  /// updater documents and logs when it has to use this.
  fn write_points<'a>(
    &'a self,
    artist_id: &'a ArtistId,
    points: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
