//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings, calendar dates as ISO 8601
//! dates, UUIDs as hyphenated lowercase strings, and the validating newtypes
//! (member id, phone, email) as their canonical string forms.

use chrono::{DateTime, NaiveDate, Utc};
use ovation_core::{
  member::{
    Email, Gender, IndividualProfile, MemberId, MemberProfile, PhoneNumber,
    SponsorProfile,
  },
  vote::{Artist, ArtistId},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  s.parse().map_err(|_| Error::DateParse(format!("bad date: {s:?}")))
}

// ─── Gender ──────────────────────────────────────────────────────────────────

pub fn encode_gender(g: Gender) -> &'static str {
  match g {
    Gender::Female => "female",
    Gender::Male => "male",
    Gender::Other => "other",
    Gender::NoAnswer => "no_answer",
  }
}

pub fn decode_gender(s: &str) -> Result<Gender> {
  match s {
    "female" => Ok(Gender::Female),
    "male" => Ok(Gender::Male),
    "other" => Ok(Gender::Other),
    "no_answer" => Ok(Gender::NoAnswer),
    other => Err(Error::DateParse(format!("unknown gender: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `individual_members` row.
pub struct RawIndividual {
  pub member_id:        String,
  pub subject_id:       String,
  pub email:            String,
  pub family_name:      String,
  pub given_name:       String,
  pub family_name_kana: Option<String>,
  pub given_name_kana:  Option<String>,
  pub birth_date:       String,
  pub gender:           String,
  pub phone:            String,
  pub nickname:         Option<String>,
  pub created_at:       String,
}

impl RawIndividual {
  pub fn into_profile(self) -> Result<MemberProfile> {
    Ok(MemberProfile::Individual(IndividualProfile {
      member_id:        MemberId::parse(&self.member_id)?,
      subject_id:       decode_uuid(&self.subject_id)?,
      email:            Email::new(&self.email)?,
      family_name:      self.family_name,
      given_name:       self.given_name,
      family_name_kana: self.family_name_kana,
      given_name_kana:  self.given_name_kana,
      birth_date:       decode_date(&self.birth_date)?,
      gender:           decode_gender(&self.gender)?,
      phone:            PhoneNumber::new(&self.phone)?,
      nickname:         self.nickname,
      created_at:       decode_dt(&self.created_at)?,
    }))
  }
}

/// Raw strings read directly from a `sponsor_members` row.
pub struct RawSponsor {
  pub member_id:       String,
  pub subject_id:      String,
  pub email:           String,
  pub family_name:     String,
  pub given_name:      String,
  pub company_name:    String,
  pub company_address: Option<String>,
  pub department:      Option<String>,
  pub position:        Option<String>,
  pub contact_phone:   String,
  pub created_at:      String,
}

impl RawSponsor {
  pub fn into_profile(self) -> Result<MemberProfile> {
    Ok(MemberProfile::Sponsor(SponsorProfile {
      member_id:       MemberId::parse(&self.member_id)?,
      subject_id:      decode_uuid(&self.subject_id)?,
      email:           Email::new(&self.email)?,
      family_name:     self.family_name,
      given_name:      self.given_name,
      company_name:    self.company_name,
      company_address: self.company_address,
      department:      self.department,
      position:        self.position,
      contact_phone:   PhoneNumber::new(&self.contact_phone)?,
      created_at:      decode_dt(&self.created_at)?,
    }))
  }
}

/// Raw strings read directly from an `artists` row.
pub struct RawArtist {
  pub artist_id: String,
  pub name:      String,
  pub is_active: bool,
}

impl RawArtist {
  pub fn into_artist(self) -> Result<Artist> {
    Ok(Artist {
      artist_id: ArtistId::new(&self.artist_id)?,
      name:      self.name,
      is_active: self.is_active,
    })
  }
}
