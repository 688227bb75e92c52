//! Membership records — the two disjoint profile classes and their keys.
//!
//! A subject (external authentication identity) owns at most one profile, in
//! at most one class. The closed [`MemberProfile`] enum is matched
//! exhaustively at every consumption site; there is no "profile of unknown
//! shape" anywhere in the system.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Class ───────────────────────────────────────────────────────────────────

/// The disjoint partition a profile belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberClass {
  Individual,
  Sponsor,
}

impl MemberClass {
  /// Leading character of every member id in this class.
  pub fn prefix(self) -> char {
    match self {
      Self::Individual => 'M',
      Self::Sponsor => 'S',
    }
  }
}

impl std::fmt::Display for MemberClass {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Individual => write!(f, "individual"),
      Self::Sponsor => write!(f, "sponsor"),
    }
  }
}

// ─── Member id ───────────────────────────────────────────────────────────────

/// Digits in the suffix of a sequentially allocated id, e.g. `M000042`.
pub const SEQUENCE_WIDTH: usize = 6;

/// A human-readable member identifier: class prefix plus numeric suffix.
///
/// Two shapes exist. Sequential ids (`M000042`) carry a zero-padded
/// [`SEQUENCE_WIDTH`]-digit counter and are the normal case. Degraded ids
/// (`M17228390001234`, epoch seconds plus a random component) are minted only
/// when the allocator cannot read the current high-water mark; they are
/// longer than [`SEQUENCE_WIDTH`] digits and never participate in sequence
/// reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(String);

impl MemberId {
  /// Build the sequential id for `sequence` in `class`.
  pub fn sequential(class: MemberClass, sequence: u32) -> Self {
    Self(format!("{}{:0width$}", class.prefix(), sequence, width = SEQUENCE_WIDTH))
  }

  /// Build a degraded liveness-fallback id from a wall-clock reading and a
  /// random component.
  pub fn degraded(class: MemberClass, epoch_secs: i64, entropy: u32) -> Self {
    Self(format!("{}{}{:04}", class.prefix(), epoch_secs, entropy % 10_000))
  }

  /// Parse an id previously produced by this type.
  pub fn parse(s: &str) -> Result<Self> {
    let mut chars = s.chars();
    let prefix = chars.next();
    let rest = chars.as_str();

    let prefix_ok = matches!(prefix, Some('M') | Some('S'));
    let digits_ok =
      rest.len() >= SEQUENCE_WIDTH && rest.chars().all(|c| c.is_ascii_digit());

    if prefix_ok && digits_ok {
      Ok(Self(s.to_owned()))
    } else {
      Err(Error::InvalidMemberId(s.to_owned()))
    }
  }

  pub fn class(&self) -> MemberClass {
    // The constructor guarantees the prefix is one of the two class letters.
    match self.0.chars().next() {
      Some('S') => MemberClass::Sponsor,
      _ => MemberClass::Individual,
    }
  }

  /// The numeric counter, for sequential ids only. Degraded ids return
  /// `None` and are skipped by the allocator's high-water-mark read.
  pub fn sequence(&self) -> Option<u32> {
    let rest = &self.0[1..];
    if rest.len() == SEQUENCE_WIDTH {
      rest.parse().ok()
    } else {
      None
    }
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl std::fmt::Display for MemberId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

impl Serialize for MemberId {
  fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&self.0)
  }
}

impl<'de> Deserialize<'de> for MemberId {
  fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(d)?;
    Self::parse(&raw).map_err(serde::de::Error::custom)
  }
}

// ─── Validating newtypes ─────────────────────────────────────────────────────

/// A domestic phone number, normalized to bare digits.
///
/// The normalized form doubles as the voter identity key: both the
/// authenticated and the anonymous voting path key their daily-vote
/// uniqueness on this value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
  pub fn new(raw: &str) -> Result<Self> {
    let ok_chars = raw
      .chars()
      .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')'));
    if !ok_chars {
      return Err(Error::InvalidPhoneNumber(raw.to_owned()));
    }

    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if !(10..=11).contains(&digits.len()) || !digits.starts_with('0') {
      return Err(Error::InvalidPhoneNumber(raw.to_owned()));
    }

    Ok(Self(digits))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl std::fmt::Display for PhoneNumber {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

impl Serialize for PhoneNumber {
  fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&self.0)
  }
}

impl<'de> Deserialize<'de> for PhoneNumber {
  fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(d)?;
    Self::new(&raw).map_err(serde::de::Error::custom)
  }
}

/// An email address, trimmed and lowercased on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Email(String);

impl Email {
  pub fn new(raw: &str) -> Result<Self> {
    let normalized = raw.trim().to_ascii_lowercase();
    let valid = match normalized.split_once('@') {
      Some((local, domain)) => {
        !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
      }
      None => false,
    };
    if valid {
      Ok(Self(normalized))
    } else {
      Err(Error::InvalidEmail(raw.to_owned()))
    }
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl std::fmt::Display for Email {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

impl Serialize for Email {
  fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&self.0)
  }
}

impl<'de> Deserialize<'de> for Email {
  fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(d)?;
    Self::new(&raw).map_err(serde::de::Error::custom)
  }
}

// ─── Profile field groups ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
  Female,
  Male,
  Other,
  NoAnswer,
}

/// Registration fields for an individual member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndividualFields {
  pub family_name:      String,
  pub given_name:       String,
  pub family_name_kana: Option<String>,
  pub given_name_kana:  Option<String>,
  pub birth_date:       NaiveDate,
  pub gender:           Gender,
  pub phone:            PhoneNumber,
  pub nickname:         Option<String>,
}

/// Registration fields for a sponsor member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SponsorFields {
  pub family_name:     String,
  pub given_name:      String,
  pub company_name:    String,
  pub company_address: Option<String>,
  pub department:      Option<String>,
  pub position:        Option<String>,
  pub contact_phone:   PhoneNumber,
}

/// The fields a registrant submits to complete a profile; the class is the
/// variant, never a separate flag that could disagree with the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "lowercase")]
pub enum ProfileDraft {
  Individual(IndividualFields),
  Sponsor(SponsorFields),
}

impl ProfileDraft {
  pub fn class(&self) -> MemberClass {
    match self {
      Self::Individual(_) => MemberClass::Individual,
      Self::Sponsor(_) => MemberClass::Sponsor,
    }
  }
}

// ─── Stored profiles ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndividualProfile {
  pub member_id:        MemberId,
  pub subject_id:       Uuid,
  pub email:            Email,
  pub family_name:      String,
  pub given_name:       String,
  pub family_name_kana: Option<String>,
  pub given_name_kana:  Option<String>,
  pub birth_date:       NaiveDate,
  pub gender:           Gender,
  pub phone:            PhoneNumber,
  pub nickname:         Option<String>,
  pub created_at:       DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SponsorProfile {
  pub member_id:       MemberId,
  pub subject_id:      Uuid,
  pub email:           Email,
  pub family_name:     String,
  pub given_name:      String,
  pub company_name:    String,
  pub company_address: Option<String>,
  pub department:      Option<String>,
  pub position:        Option<String>,
  pub contact_phone:   PhoneNumber,
  pub created_at:      DateTime<Utc>,
}

/// One of the two disjoint membership records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "lowercase")]
pub enum MemberProfile {
  Individual(IndividualProfile),
  Sponsor(SponsorProfile),
}

impl MemberProfile {
  pub fn class(&self) -> MemberClass {
    match self {
      Self::Individual(_) => MemberClass::Individual,
      Self::Sponsor(_) => MemberClass::Sponsor,
    }
  }

  pub fn member_id(&self) -> &MemberId {
    match self {
      Self::Individual(p) => &p.member_id,
      Self::Sponsor(p) => &p.member_id,
    }
  }

  pub fn subject_id(&self) -> Uuid {
    match self {
      Self::Individual(p) => p.subject_id,
      Self::Sponsor(p) => p.subject_id,
    }
  }

  pub fn email(&self) -> &Email {
    match self {
      Self::Individual(p) => &p.email,
      Self::Sponsor(p) => &p.email,
    }
  }

  /// The phone number on file, usable as pre-verified voter identity.
  pub fn phone(&self) -> &PhoneNumber {
    match self {
      Self::Individual(p) => &p.phone,
      Self::Sponsor(p) => &p.contact_phone,
    }
  }
}

// ─── New profile ─────────────────────────────────────────────────────────────

/// Input to [`crate::store::MemberStore::insert_profile`], assembled by the
/// registry gateway once an id has been allocated. `created_at` is always
/// set by the store; it is not accepted from callers.
#[derive(Debug, Clone)]
pub struct NewProfile {
  pub member_id:  MemberId,
  pub subject_id: Uuid,
  pub email:      Email,
  pub fields:     ProfileDraft,
}
