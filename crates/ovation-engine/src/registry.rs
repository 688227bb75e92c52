//! The member registry gateway.
//!
//! Classifies a subject into one of the two disjoint membership classes and
//! creates new profiles. Creation is safe under concurrent retries: the
//! cross-class email pre-check closes the shadow-account hole, and the
//! storage constraints arbitrate everything the pre-check cannot see.

use std::sync::Arc;

use ovation_core::{
  config::EngineConfig,
  identity::AuthSubject,
  member::{MemberClass, MemberProfile, NewProfile, ProfileDraft},
  retry::{Attempt, RetryError},
  store::{MemberConflict, MemberInsert, MemberStore},
};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::{BoxError, allocator::IdAllocator};

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RegistryError {
  /// The email already backs a profile in one of the two classes — possibly
  /// under a different authentication subject. Registration must not create
  /// a second account for the same person.
  #[error("this email is already registered")]
  EmailAlreadyRegistered,

  /// The subject already completed registration; the existing profile is
  /// authoritative.
  #[error("subject {0} already has a profile")]
  ProfileAlreadyExists(Uuid),

  /// The provider supplied no email for this subject, so the cross-class
  /// duplicate check cannot run.
  #[error("no email address is available for this subject")]
  MissingEmail,

  /// Every allocation attempt collided. Surfaced, never downgraded to an
  /// unverified id.
  #[error("member id allocation exhausted after {attempts} attempts")]
  AllocationExhausted { attempts: u32 },

  #[error("member store error: {0}")]
  Store(#[source] BoxError),
}

fn store_err<E>(error: E) -> RegistryError
where
  E: std::error::Error + Send + Sync + 'static,
{
  RegistryError::Store(Box::new(error))
}

// ─── Gateway ─────────────────────────────────────────────────────────────────

pub struct MemberRegistry<M> {
  members:   Arc<M>,
  allocator: IdAllocator<M>,
  config:    EngineConfig,
}

impl<M> Clone for MemberRegistry<M> {
  fn clone(&self) -> Self {
    Self {
      members:   Arc::clone(&self.members),
      allocator: self.allocator.clone(),
      config:    self.config.clone(),
    }
  }
}

impl<M: MemberStore> MemberRegistry<M> {
  pub fn new(members: Arc<M>, config: EngineConfig) -> Self {
    let allocator = IdAllocator::new(Arc::clone(&members));
    Self { members, allocator, config }
  }

  /// The profile backing `subject_id`, if any. Checks Individual before
  /// Sponsor; the order is a fixed tie-break, not a correctness requirement,
  /// since the classes are disjoint.
  pub async fn lookup(
    &self,
    subject_id: Uuid,
  ) -> Result<Option<MemberProfile>, RegistryError> {
    if let Some(profile) = self
      .members
      .find_profile(MemberClass::Individual, subject_id)
      .await
      .map_err(store_err)?
    {
      return Ok(Some(profile));
    }
    self
      .members
      .find_profile(MemberClass::Sponsor, subject_id)
      .await
      .map_err(store_err)
  }

  /// Create the profile that completes `subject`'s registration.
  ///
  /// A member-id collision is retried with a freshly allocated id — a
  /// collision on the id is not evidence that this subject already has a
  /// profile. Subject and email collisions are terminal.
  pub async fn complete_profile(
    &self,
    subject: &AuthSubject,
    draft: ProfileDraft,
  ) -> Result<MemberProfile, RegistryError> {
    let email = subject.email.clone().ok_or(RegistryError::MissingEmail)?;

    // Uniform across password and delegated subjects: one natural person
    // must not hold profiles in both classes under different subjects.
    if self.members.email_class(&email).await.map_err(store_err)?.is_some() {
      return Err(RegistryError::EmailAlreadyRegistered);
    }

    let class = draft.class();
    let policy = self.config.allocation_policy();

    let result = policy
      .run(async |attempt| {
        let member_id = self.allocator.next(class).await;
        let record = NewProfile {
          member_id,
          subject_id: subject.subject_id,
          email: email.clone(),
          fields: draft.clone(),
        };

        match self.members.insert_profile(record).await {
          Ok(MemberInsert::Created(profile)) => Attempt::Done(profile),
          Ok(MemberInsert::Conflict(MemberConflict::MemberId)) => {
            debug!(attempt, %class, "member id collision; reallocating");
            Attempt::Again
          }
          Ok(MemberInsert::Conflict(MemberConflict::Subject)) => {
            Attempt::Fail(RegistryError::ProfileAlreadyExists(subject.subject_id))
          }
          Ok(MemberInsert::Conflict(MemberConflict::Email)) => {
            // Constraint-level backstop for the pre-check losing a race.
            Attempt::Fail(RegistryError::EmailAlreadyRegistered)
          }
          Err(error) => Attempt::Fail(store_err(error)),
        }
      })
      .await;

    match result {
      Ok(profile) => Ok(profile),
      Err(RetryError::Terminal(error)) => Err(error),
      Err(RetryError::Exhausted { attempts }) => {
        Err(RegistryError::AllocationExhausted { attempts })
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use chrono::NaiveDate;
  use ovation_core::member::{
    Email, Gender, IndividualFields, MemberId, PhoneNumber, ProfileDraft,
    SponsorFields,
  };
  use ovation_core::identity::AuthProviderKind;
  use ovation_store_sqlite::SqliteStore;
  use std::sync::atomic::{AtomicU32, Ordering};
  use thiserror::Error;

  fn subject(email: &str) -> AuthSubject {
    AuthSubject {
      subject_id: Uuid::new_v4(),
      email:      Some(Email::new(email).unwrap()),
      provider:   AuthProviderKind::Password,
    }
  }

  fn individual_draft() -> ProfileDraft {
    ProfileDraft::Individual(IndividualFields {
      family_name:      "Sato".into(),
      given_name:       "Hana".into(),
      family_name_kana: None,
      given_name_kana:  None,
      birth_date:       NaiveDate::from_ymd_opt(1998, 4, 2).unwrap(),
      gender:           Gender::Female,
      phone:            PhoneNumber::new("090-1111-2222").unwrap(),
      nickname:         None,
    })
  }

  fn sponsor_draft() -> ProfileDraft {
    ProfileDraft::Sponsor(SponsorFields {
      family_name:     "Tanaka".into(),
      given_name:      "Jiro".into(),
      company_name:    "Tanaka Holdings".into(),
      company_address: None,
      department:      None,
      position:        None,
      contact_phone:   PhoneNumber::new("0312345678").unwrap(),
    })
  }

  async fn registry() -> MemberRegistry<SqliteStore> {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    MemberRegistry::new(store, EngineConfig::default())
  }

  #[tokio::test]
  async fn complete_profile_allocates_sequential_ids() {
    let registry = registry().await;

    let first = registry
      .complete_profile(&subject("a@example.com"), individual_draft())
      .await
      .unwrap();
    let second = registry
      .complete_profile(&subject("b@example.com"), individual_draft())
      .await
      .unwrap();

    assert_eq!(first.member_id().as_str(), "M000001");
    assert_eq!(second.member_id().as_str(), "M000002");
  }

  #[tokio::test]
  async fn lookup_finds_either_class() {
    let registry = registry().await;

    let fan = subject("fan@example.com");
    registry.complete_profile(&fan, individual_draft()).await.unwrap();

    let sponsor = subject("pr@corp.example.com");
    registry.complete_profile(&sponsor, sponsor_draft()).await.unwrap();

    let found_fan = registry.lookup(fan.subject_id).await.unwrap().unwrap();
    assert_eq!(found_fan.class(), MemberClass::Individual);

    let found_sponsor = registry.lookup(sponsor.subject_id).await.unwrap().unwrap();
    assert_eq!(found_sponsor.class(), MemberClass::Sponsor);

    assert!(registry.lookup(Uuid::new_v4()).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn second_completion_for_same_subject_does_not_create_twice() {
    let registry = registry().await;
    let subject = subject("once@example.com");

    registry.complete_profile(&subject, individual_draft()).await.unwrap();

    let err = registry
      .complete_profile(&subject, individual_draft())
      .await
      .unwrap_err();
    assert!(matches!(err, RegistryError::EmailAlreadyRegistered));
  }

  #[tokio::test]
  async fn same_email_cannot_register_the_other_class() {
    let registry = registry().await;

    registry
      .complete_profile(&subject("dual@example.com"), individual_draft())
      .await
      .unwrap();

    let err = registry
      .complete_profile(&subject("dual@example.com"), sponsor_draft())
      .await
      .unwrap_err();
    assert!(matches!(err, RegistryError::EmailAlreadyRegistered));
  }

  #[tokio::test]
  async fn interleaved_creates_keep_every_subject_in_exactly_one_class() {
    let registry = registry().await;

    let mut expected = Vec::new();
    for i in 0..10 {
      let subject = subject(&format!("mixed{i}@example.com"));
      let (draft, class) = if i % 2 == 0 {
        (individual_draft(), MemberClass::Individual)
      } else {
        (sponsor_draft(), MemberClass::Sponsor)
      };
      registry.complete_profile(&subject, draft).await.unwrap();
      expected.push((subject.subject_id, class));
    }

    for (subject_id, class) in expected {
      let profile = registry.lookup(subject_id).await.unwrap().unwrap();
      assert_eq!(profile.class(), class);

      // Never present in the other class's table.
      let other = match class {
        MemberClass::Individual => MemberClass::Sponsor,
        MemberClass::Sponsor => MemberClass::Individual,
      };
      assert!(
        registry
          .members
          .find_profile(other, subject_id)
          .await
          .unwrap()
          .is_none()
      );
    }
  }

  #[tokio::test]
  async fn subject_without_email_cannot_register() {
    let registry = registry().await;
    let mut s = subject("x@example.com");
    s.email = None;

    let err = registry.complete_profile(&s, individual_draft()).await.unwrap_err();
    assert!(matches!(err, RegistryError::MissingEmail));
  }

  // ── Collision retry against a scripted store ──────────────────────────────

  #[derive(Debug, Error)]
  #[error("scripted store failure")]
  struct ScriptedFailure;

  /// Reports a member-id conflict for the first `collisions` inserts, then
  /// succeeds. Sequence reads always return `None` so every candidate id is
  /// identical, as in a genuine allocator race.
  struct CollidingStore {
    collisions: u32,
    inserts:    AtomicU32,
  }

  impl MemberStore for CollidingStore {
    type Error = ScriptedFailure;

    async fn find_profile(
      &self,
      _: MemberClass,
      _: Uuid,
    ) -> Result<Option<MemberProfile>, ScriptedFailure> {
      Ok(None)
    }

    async fn email_class(
      &self,
      _: &Email,
    ) -> Result<Option<MemberClass>, ScriptedFailure> {
      Ok(None)
    }

    async fn insert_profile(
      &self,
      record: NewProfile,
    ) -> Result<MemberInsert, ScriptedFailure> {
      let n = self.inserts.fetch_add(1, Ordering::SeqCst);
      if n < self.collisions {
        Ok(MemberInsert::Conflict(MemberConflict::MemberId))
      } else {
        let profile = match record.fields {
          ProfileDraft::Individual(f) => {
            MemberProfile::Individual(ovation_core::member::IndividualProfile {
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
              created_at:       chrono::Utc::now(),
            })
          }
          ProfileDraft::Sponsor(f) => {
            MemberProfile::Sponsor(ovation_core::member::SponsorProfile {
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
              created_at:      chrono::Utc::now(),
            })
          }
        };
        Ok(MemberInsert::Created(profile))
      }
    }

    async fn highest_sequential_id(
      &self,
      _: MemberClass,
    ) -> Result<Option<MemberId>, ScriptedFailure> {
      Ok(None)
    }
  }

  fn fast_config() -> EngineConfig {
    EngineConfig { allocator_jitter_ms: 0, ..Default::default() }
  }

  #[tokio::test]
  async fn member_id_collision_is_retried_with_a_fresh_allocation() {
    let store = Arc::new(CollidingStore { collisions: 2, inserts: AtomicU32::new(0) });
    let registry = MemberRegistry::new(Arc::clone(&store), fast_config());

    let profile = registry
      .complete_profile(&subject("retry@example.com"), individual_draft())
      .await
      .unwrap();

    assert_eq!(store.inserts.load(Ordering::SeqCst), 3);
    assert_eq!(profile.member_id().as_str(), "M000001");
  }

  #[tokio::test]
  async fn unbroken_collisions_exhaust_the_attempt_budget() {
    let store = Arc::new(CollidingStore {
      collisions: u32::MAX,
      inserts:    AtomicU32::new(0),
    });
    let registry = MemberRegistry::new(store, fast_config());

    let err = registry
      .complete_profile(&subject("doomed@example.com"), individual_draft())
      .await
      .unwrap_err();
    assert!(matches!(err, RegistryError::AllocationExhausted { attempts: 5 }));
  }

  #[tokio::test]
  async fn concurrent_registrations_get_distinct_ids() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    // Worst-case contention burns one attempt per competing registrant, so
    // the budget here must cover the full field.
    let config = EngineConfig {
      allocator_attempts:  64,
      allocator_jitter_ms: 2,
      ..Default::default()
    };
    let registry = MemberRegistry::new(store, config);

    let mut handles = Vec::new();
    for i in 0..20 {
      let registry = registry.clone();
      handles.push(tokio::spawn(async move {
        registry
          .complete_profile(&subject(&format!("fan{i}@example.com")), individual_draft())
          .await
          .unwrap()
      }));
    }

    let mut ids = std::collections::HashSet::new();
    for handle in handles {
      let profile = handle.await.unwrap();
      ids.insert(profile.member_id().clone());
    }
    assert_eq!(ids.len(), 20, "every concurrent registrant got a unique id");
  }
}
