//! Votes, artists, and the per-artist point tally.
//!
//! A vote is created once per successful submission and never mutated. The
//! uniqueness invariant — at most one vote per identity per artist per
//! calendar day — lives on the `(voter_key, artist_id, vote_date)` triple and
//! is carried by the storage layer as a composite constraint.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset as _, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, member::PhoneNumber};

// ─── Artist ──────────────────────────────────────────────────────────────────

/// Short public identifier for an artist, e.g. `A1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtistId(String);

impl ArtistId {
  pub fn new(raw: &str) -> Result<Self> {
    let trimmed = raw.trim();
    let ok = !trimmed.is_empty()
      && trimmed.len() <= 32
      && trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if ok {
      Ok(Self(trimmed.to_owned()))
    } else {
      Err(Error::InvalidArtistId(raw.to_owned()))
    }
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl std::fmt::Display for ArtistId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

impl Serialize for ArtistId {
  fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&self.0)
  }
}

impl<'de> Deserialize<'de> for ArtistId {
  fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(d)?;
    Self::new(&raw).map_err(serde::de::Error::custom)
  }
}

/// Catalog entry a vote must reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
  pub artist_id: ArtistId,
  pub name:      String,
  pub is_active: bool,
}

// ─── Vote ────────────────────────────────────────────────────────────────────

/// A recorded vote. Immutable once written; the moderation flag is the only
/// field an external process may change, and it does not affect uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
  pub vote_id:     Uuid,
  pub artist_id:   ArtistId,
  /// Normalized verified phone number; the daily-uniqueness key shared by
  /// authenticated and anonymous voters.
  pub voter_key:   PhoneNumber,
  /// Provenance only — never part of the uniqueness key.
  pub subject_id:  Option<Uuid>,
  pub voter_name:  String,
  pub message:     Option<String>,
  pub vote_date:   NaiveDate,
  pub created_at:  DateTime<Utc>,
  pub is_approved: bool,
}

/// Input to [`crate::store::VoteStore::insert_vote`]. `vote_id` and
/// `created_at` are set by the store.
#[derive(Debug, Clone)]
pub struct NewVote {
  pub artist_id:  ArtistId,
  pub voter_key:  PhoneNumber,
  pub subject_id: Option<Uuid>,
  pub voter_name: String,
  pub message:    Option<String>,
  pub vote_date:  NaiveDate,
}

// ─── Tally ───────────────────────────────────────────────────────────────────

/// Denormalized per-artist points. Eventually consistent; rebuildable from
/// the vote ledger, mutated only by addition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistTally {
  pub artist_id: ArtistId,
  pub points:    i64,
}

// ─── Calendar day ────────────────────────────────────────────────────────────

/// The contest-local calendar day containing `now`.
///
/// Offsets outside the valid range fall back to UTC rather than panicking;
/// configuration validation is the caller's concern.
pub fn vote_day(now: DateTime<Utc>, utc_offset_hours: i32) -> NaiveDate {
  let offset = FixedOffset::east_opt(utc_offset_hours.saturating_mul(3600))
    .unwrap_or_else(|| Utc.fix());
  now.with_timezone(&offset).date_naive()
}
