//! [`SqliteStore`] — the SQLite implementation of the Ovation store traits.

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use ovation_core::{
  member::{
    Email, MemberClass, MemberId, MemberProfile, NewProfile, PhoneNumber,
    ProfileDraft, IndividualProfile, SponsorProfile, SEQUENCE_WIDTH,
  },
  store::{
    MemberConflict, MemberInsert, MemberStore, TallyStore, VoteInsert, VoteStore,
  },
  vote::{Artist, ArtistId, NewVote, Vote},
};

use crate::{
  encode::{
    encode_date, encode_dt, encode_gender, encode_uuid, RawArtist, RawIndividual,
    RawSponsor,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Conflict classification ─────────────────────────────────────────────────

/// The UNIQUE-violation message, if `e` is one. SQLite names the violated
/// columns in the message (`UNIQUE constraint failed: table.column`), which
/// is the only way to tell the three membership constraints apart.
fn unique_violation(e: &rusqlite::Error) -> Option<String> {
  if let rusqlite::Error::SqliteFailure(f, Some(msg)) = e
    && f.code == rusqlite::ErrorCode::ConstraintViolation
    && msg.contains("UNIQUE constraint failed")
  {
    return Some(msg.clone());
  }
  None
}

fn member_conflict_from(msg: &str) -> MemberConflict {
  if msg.contains(".subject_id") {
    MemberConflict::Subject
  } else if msg.contains(".email") {
    MemberConflict::Email
  } else {
    // The only remaining unique column on the membership tables.
    MemberConflict::MemberId
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Ovation store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Create or update an artist catalog entry.
  pub async fn upsert_artist(&self, artist: Artist) -> Result<()> {
    let id_str = artist.artist_id.as_str().to_owned();
    let name = artist.name;
    let active = artist.is_active;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO artists (artist_id, name, is_active) VALUES (?1, ?2, ?3)
           ON CONFLICT(artist_id) DO UPDATE
             SET name = excluded.name, is_active = excluded.is_active",
          rusqlite::params![id_str, name, active],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn find_individual(&self, subject_id: Uuid) -> Result<Option<MemberProfile>> {
    let subject_str = encode_uuid(subject_id);

    let raw: Option<RawIndividual> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT member_id, subject_id, email, family_name, given_name,
                      family_name_kana, given_name_kana, birth_date, gender,
                      phone, nickname, created_at
               FROM individual_members WHERE subject_id = ?1",
              rusqlite::params![subject_str],
              |row| {
                Ok(RawIndividual {
                  member_id:        row.get(0)?,
                  subject_id:       row.get(1)?,
                  email:            row.get(2)?,
                  family_name:      row.get(3)?,
                  given_name:       row.get(4)?,
                  family_name_kana: row.get(5)?,
                  given_name_kana:  row.get(6)?,
                  birth_date:       row.get(7)?,
                  gender:           row.get(8)?,
                  phone:            row.get(9)?,
                  nickname:         row.get(10)?,
                  created_at:       row.get(11)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawIndividual::into_profile).transpose()
  }

  async fn find_sponsor(&self, subject_id: Uuid) -> Result<Option<MemberProfile>> {
    let subject_str = encode_uuid(subject_id);

    let raw: Option<RawSponsor> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT member_id, subject_id, email, family_name, given_name,
                      company_name, company_address, department, position,
                      contact_phone, created_at
               FROM sponsor_members WHERE subject_id = ?1",
              rusqlite::params![subject_str],
              |row| {
                Ok(RawSponsor {
                  member_id:       row.get(0)?,
                  subject_id:      row.get(1)?,
                  email:           row.get(2)?,
                  family_name:     row.get(3)?,
                  given_name:      row.get(4)?,
                  company_name:    row.get(5)?,
                  company_address: row.get(6)?,
                  department:      row.get(7)?,
                  position:        row.get(8)?,
                  contact_phone:   row.get(9)?,
                  created_at:      row.get(10)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSponsor::into_profile).transpose()
  }
}

// ─── MemberStore impl ────────────────────────────────────────────────────────

impl MemberStore for SqliteStore {
  type Error = Error;

  async fn find_profile(
    &self,
    class: MemberClass,
    subject_id: Uuid,
  ) -> Result<Option<MemberProfile>> {
    match class {
      MemberClass::Individual => self.find_individual(subject_id).await,
      MemberClass::Sponsor => self.find_sponsor(subject_id).await,
    }
  }

  async fn email_class(&self, email: &Email) -> Result<Option<MemberClass>> {
    let email_str = email.as_str().to_owned();

    let class = self
      .conn
      .call(move |conn| {
        let in_individual: bool = conn
          .query_row(
            "SELECT 1 FROM individual_members WHERE email = ?1",
            rusqlite::params![email_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        if in_individual {
          return Ok(Some(MemberClass::Individual));
        }

        let in_sponsor: bool = conn
          .query_row(
            "SELECT 1 FROM sponsor_members WHERE email = ?1",
            rusqlite::params![email_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        Ok(if in_sponsor { Some(MemberClass::Sponsor) } else { None })
      })
      .await?;

    Ok(class)
  }

  async fn insert_profile(&self, record: NewProfile) -> Result<MemberInsert> {
    let created_at = Utc::now();

    // Assemble the stored profile up front; on success it is returned as-is.
    let profile = match record.fields {
      ProfileDraft::Individual(f) => MemberProfile::Individual(IndividualProfile {
        member_id:        record.member_id,
        subject_id:       record.subject_id,
        email:            record.email,
        family_name:      f.family_name,
        given_name:       f.given_name,
        family_name_kana: f.family_name_kana,
        given_name_kana:  f.given_name_kana,
        birth_date:       f.birth_date,
        gender:           f.gender,
        phone:            f.phone,
        nickname:         f.nickname,
        created_at,
      }),
      ProfileDraft::Sponsor(f) => MemberProfile::Sponsor(SponsorProfile {
        member_id:       record.member_id,
        subject_id:      record.subject_id,
        email:           record.email,
        family_name:     f.family_name,
        given_name:      f.given_name,
        company_name:    f.company_name,
        company_address: f.company_address,
        department:      f.department,
        position:        f.position,
        contact_phone:   f.contact_phone,
        created_at,
      }),
    };

    let conflict: Option<String> = match &profile {
      MemberProfile::Individual(p) => {
        let params = (
          p.member_id.as_str().to_owned(),
          encode_uuid(p.subject_id),
          p.email.as_str().to_owned(),
          p.family_name.clone(),
          p.given_name.clone(),
          p.family_name_kana.clone(),
          p.given_name_kana.clone(),
          encode_date(p.birth_date),
          encode_gender(p.gender).to_owned(),
          p.phone.as_str().to_owned(),
          p.nickname.clone(),
          encode_dt(p.created_at),
        );
        self
          .conn
          .call(move |conn| {
            let res = conn.execute(
              "INSERT INTO individual_members (
                 member_id, subject_id, email, family_name, given_name,
                 family_name_kana, given_name_kana, birth_date, gender,
                 phone, nickname, created_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
              rusqlite::params![
                params.0, params.1, params.2, params.3, params.4, params.5,
                params.6, params.7, params.8, params.9, params.10, params.11,
              ],
            );
            match res {
              Ok(_) => Ok(None),
              Err(e) => match unique_violation(&e) {
                Some(msg) => Ok(Some(msg)),
                None => Err(e.into()),
              },
            }
          })
          .await?
      }
      MemberProfile::Sponsor(p) => {
        let params = (
          p.member_id.as_str().to_owned(),
          encode_uuid(p.subject_id),
          p.email.as_str().to_owned(),
          p.family_name.clone(),
          p.given_name.clone(),
          p.company_name.clone(),
          p.company_address.clone(),
          p.department.clone(),
          p.position.clone(),
          p.contact_phone.as_str().to_owned(),
          encode_dt(p.created_at),
        );
        self
          .conn
          .call(move |conn| {
            let res = conn.execute(
              "INSERT INTO sponsor_members (
                 member_id, subject_id, email, family_name, given_name,
                 company_name, company_address, department, position,
                 contact_phone, created_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
              rusqlite::params![
                params.0, params.1, params.2, params.3, params.4, params.5,
                params.6, params.7, params.8, params.9, params.10,
              ],
            );
            match res {
              Ok(_) => Ok(None),
              Err(e) => match unique_violation(&e) {
                Some(msg) => Ok(Some(msg)),
                None => Err(e.into()),
              },
            }
          })
          .await?
      }
    };

    Ok(match conflict {
      None => MemberInsert::Created(profile),
      Some(msg) => MemberInsert::Conflict(member_conflict_from(&msg)),
    })
  }

  async fn highest_sequential_id(
    &self,
    class: MemberClass,
  ) -> Result<Option<MemberId>> {
    // Degraded (timestamp-based) ids have longer suffixes and must not feed
    // the sequence; the GLOB pattern admits exactly the sequential shape.
    let pattern =
      format!("{}{}", class.prefix(), "[0-9]".repeat(SEQUENCE_WIDTH));
    let table = match class {
      MemberClass::Individual => "individual_members",
      MemberClass::Sponsor => "sponsor_members",
    };
    let sql = format!(
      "SELECT member_id FROM {table}
       WHERE member_id GLOB ?1
       ORDER BY member_id DESC LIMIT 1"
    );

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![pattern], |row| row.get(0))
            .optional()?,
        )
      })
      .await?;

    raw.as_deref().map(MemberId::parse).transpose().map_err(Error::Core)
  }
}

// ─── VoteStore impl ──────────────────────────────────────────────────────────

impl VoteStore for SqliteStore {
  type Error = Error;

  async fn get_artist(&self, artist_id: &ArtistId) -> Result<Option<Artist>> {
    let id_str = artist_id.as_str().to_owned();

    let raw: Option<RawArtist> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT artist_id, name, is_active FROM artists WHERE artist_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawArtist {
                  artist_id: row.get(0)?,
                  name:      row.get(1)?,
                  is_active: row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawArtist::into_artist).transpose()
  }

  async fn insert_vote(&self, vote: NewVote) -> Result<VoteInsert> {
    let stored = Vote {
      vote_id:     Uuid::new_v4(),
      artist_id:   vote.artist_id,
      voter_key:   vote.voter_key,
      subject_id:  vote.subject_id,
      voter_name:  vote.voter_name,
      message:     vote.message,
      vote_date:   vote.vote_date,
      created_at:  Utc::now(),
      is_approved: true,
    };

    let params = (
      encode_uuid(stored.vote_id),
      stored.artist_id.as_str().to_owned(),
      stored.voter_key.as_str().to_owned(),
      stored.subject_id.map(encode_uuid),
      stored.voter_name.clone(),
      stored.message.clone(),
      encode_date(stored.vote_date),
      encode_dt(stored.created_at),
      stored.is_approved,
    );

    let duplicate: bool = self
      .conn
      .call(move |conn| {
        let res = conn.execute(
          "INSERT INTO votes (
             vote_id, artist_id, voter_key, subject_id, voter_name,
             message, vote_date, created_at, is_approved
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            params.0, params.1, params.2, params.3, params.4, params.5,
            params.6, params.7, params.8,
          ],
        );
        match res {
          Ok(_) => Ok(false),
          Err(e) => match unique_violation(&e) {
            Some(msg) if msg.contains("votes.voter_key") => Ok(true),
            _ => Err(e.into()),
          },
        }
      })
      .await?;

    Ok(if duplicate {
      VoteInsert::Duplicate
    } else {
      VoteInsert::Recorded(stored)
    })
  }

  async fn has_vote(
    &self,
    voter_key: &PhoneNumber,
    artist_id: &ArtistId,
    day: NaiveDate,
  ) -> Result<bool> {
    let key_str = voter_key.as_str().to_owned();
    let artist_str = artist_id.as_str().to_owned();
    let day_str = encode_date(day);

    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM votes
               WHERE voter_key = ?1 AND artist_id = ?2 AND vote_date = ?3",
              rusqlite::params![key_str, artist_str, day_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;

    Ok(found)
  }
}

// ─── TallyStore impl ─────────────────────────────────────────────────────────

impl TallyStore for SqliteStore {
  type Error = Error;

  async fn increment_points(&self, artist_id: &ArtistId, amount: i64) -> Result<()> {
    let id_str = artist_id.as_str().to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO artist_tallies (artist_id, points) VALUES (?1, ?2)
           ON CONFLICT(artist_id) DO UPDATE
             SET points = points + excluded.points",
          rusqlite::params![id_str, amount],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn read_points(&self, artist_id: &ArtistId) -> Result<i64> {
    let id_str = artist_id.as_str().to_owned();

    let points = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT points FROM artist_tallies WHERE artist_id = ?1",
              rusqlite::params![id_str],
              |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0),
        )
      })
      .await?;

    Ok(points)
  }

  async fn write_points(&self, artist_id: &ArtistId, points: i64) -> Result<()> {
    let id_str = artist_id.as_str().to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO artist_tallies (artist_id, points) VALUES (?1, ?2)
           ON CONFLICT(artist_id) DO UPDATE SET points = excluded.points",
          rusqlite::params![id_str, points],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
