//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use ovation_core::{
  member::{
    Email, Gender, IndividualFields, MemberClass, MemberId, NewProfile,
    PhoneNumber, ProfileDraft, SponsorFields,
  },
  store::{
    MemberConflict, MemberInsert, MemberStore, TallyStore, VoteInsert, VoteStore,
  },
  vote::{Artist, ArtistId, NewVote},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn individual_draft(phone: &str) -> ProfileDraft {
  ProfileDraft::Individual(IndividualFields {
    family_name:      "Sato".into(),
    given_name:       "Hana".into(),
    family_name_kana: Some("サトウ".into()),
    given_name_kana:  Some("ハナ".into()),
    birth_date:       NaiveDate::from_ymd_opt(1998, 4, 2).unwrap(),
    gender:           Gender::Female,
    phone:            PhoneNumber::new(phone).unwrap(),
    nickname:         Some("hana".into()),
  })
}

fn sponsor_draft(phone: &str) -> ProfileDraft {
  ProfileDraft::Sponsor(SponsorFields {
    family_name:     "Tanaka".into(),
    given_name:      "Jiro".into(),
    company_name:    "Tanaka Holdings".into(),
    company_address: Some("1-2-3 Marunouchi, Tokyo".into()),
    department:      Some("PR".into()),
    position:        None,
    contact_phone:   PhoneNumber::new(phone).unwrap(),
  })
}

fn new_profile(
  class: MemberClass,
  sequence: u32,
  email: &str,
  phone: &str,
) -> NewProfile {
  let fields = match class {
    MemberClass::Individual => individual_draft(phone),
    MemberClass::Sponsor => sponsor_draft(phone),
  };
  NewProfile {
    member_id:  MemberId::sequential(class, sequence),
    subject_id: Uuid::new_v4(),
    email:      Email::new(email).unwrap(),
    fields,
  }
}

async fn seed_artist(s: &SqliteStore, id: &str) -> ArtistId {
  let artist_id = ArtistId::new(id).unwrap();
  s.upsert_artist(Artist {
    artist_id: artist_id.clone(),
    name:      format!("Artist {id}"),
    is_active: true,
  })
  .await
  .unwrap();
  artist_id
}

fn new_vote(phone: &str, artist: &ArtistId, day: &str) -> NewVote {
  NewVote {
    artist_id:  artist.clone(),
    voter_key:  PhoneNumber::new(phone).unwrap(),
    subject_id: None,
    voter_name: "anonymous fan".into(),
    message:    Some("good luck!".into()),
    vote_date:  day.parse().unwrap(),
  }
}

// ─── Profiles ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_find_individual() {
  let s = store().await;
  let record = new_profile(MemberClass::Individual, 1, "hana@example.com", "090-1111-2222");
  let subject_id = record.subject_id;

  let outcome = s.insert_profile(record).await.unwrap();
  let MemberInsert::Created(profile) = outcome else {
    panic!("expected Created, got {outcome:?}");
  };
  assert_eq!(profile.member_id().as_str(), "M000001");

  let found = s
    .find_profile(MemberClass::Individual, subject_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found.subject_id(), subject_id);
  assert_eq!(found.phone().as_str(), "09011112222");
}

#[tokio::test]
async fn insert_and_find_sponsor() {
  let s = store().await;
  let record = new_profile(MemberClass::Sponsor, 1, "pr@tanaka.example.com", "0312345678");
  let subject_id = record.subject_id;

  s.insert_profile(record).await.unwrap();

  let found = s
    .find_profile(MemberClass::Sponsor, subject_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found.class(), MemberClass::Sponsor);
  assert_eq!(found.member_id().as_str(), "S000001");
}

#[tokio::test]
async fn subject_is_in_at_most_one_class() {
  let s = store().await;
  let record = new_profile(MemberClass::Individual, 1, "hana@example.com", "090-1111-2222");
  let subject_id = record.subject_id;
  s.insert_profile(record).await.unwrap();

  assert!(
    s.find_profile(MemberClass::Individual, subject_id)
      .await
      .unwrap()
      .is_some()
  );
  assert!(
    s.find_profile(MemberClass::Sponsor, subject_id)
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn duplicate_member_id_is_a_typed_conflict() {
  let s = store().await;
  s.insert_profile(new_profile(MemberClass::Individual, 7, "a@example.com", "090-1111-2222"))
    .await
    .unwrap();

  let outcome = s
    .insert_profile(new_profile(MemberClass::Individual, 7, "b@example.com", "090-3333-4444"))
    .await
    .unwrap();
  assert!(matches!(
    outcome,
    MemberInsert::Conflict(MemberConflict::MemberId)
  ));
}

#[tokio::test]
async fn duplicate_subject_is_a_typed_conflict() {
  let s = store().await;
  let first = new_profile(MemberClass::Individual, 1, "a@example.com", "090-1111-2222");
  let subject_id = first.subject_id;
  s.insert_profile(first).await.unwrap();

  let mut second = new_profile(MemberClass::Individual, 2, "b@example.com", "090-3333-4444");
  second.subject_id = subject_id;

  let outcome = s.insert_profile(second).await.unwrap();
  assert!(matches!(
    outcome,
    MemberInsert::Conflict(MemberConflict::Subject)
  ));
}

#[tokio::test]
async fn duplicate_email_is_a_typed_conflict() {
  let s = store().await;
  s.insert_profile(new_profile(MemberClass::Individual, 1, "same@example.com", "090-1111-2222"))
    .await
    .unwrap();

  let outcome = s
    .insert_profile(new_profile(MemberClass::Individual, 2, "same@example.com", "090-3333-4444"))
    .await
    .unwrap();
  assert!(matches!(
    outcome,
    MemberInsert::Conflict(MemberConflict::Email)
  ));
}

#[tokio::test]
async fn email_class_spans_both_tables() {
  let s = store().await;
  s.insert_profile(new_profile(MemberClass::Individual, 1, "fan@example.com", "090-1111-2222"))
    .await
    .unwrap();
  s.insert_profile(new_profile(MemberClass::Sponsor, 1, "pr@corp.example.com", "0312345678"))
    .await
    .unwrap();

  let email = |s: &str| Email::new(s).unwrap();
  assert_eq!(
    s.email_class(&email("fan@example.com")).await.unwrap(),
    Some(MemberClass::Individual)
  );
  assert_eq!(
    s.email_class(&email("pr@corp.example.com")).await.unwrap(),
    Some(MemberClass::Sponsor)
  );
  assert_eq!(s.email_class(&email("nobody@example.com")).await.unwrap(), None);
}

// ─── Id sequence reads ───────────────────────────────────────────────────────

#[tokio::test]
async fn highest_sequential_id_empty_class_is_none() {
  let s = store().await;
  assert!(
    s.highest_sequential_id(MemberClass::Individual)
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn highest_sequential_id_tracks_per_class() {
  let s = store().await;
  s.insert_profile(new_profile(MemberClass::Individual, 3, "a@example.com", "090-1111-2222"))
    .await
    .unwrap();
  s.insert_profile(new_profile(MemberClass::Individual, 12, "b@example.com", "090-3333-4444"))
    .await
    .unwrap();
  s.insert_profile(new_profile(MemberClass::Sponsor, 5, "c@corp.example.com", "0312345678"))
    .await
    .unwrap();

  let individual = s
    .highest_sequential_id(MemberClass::Individual)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(individual.sequence(), Some(12));

  let sponsor = s
    .highest_sequential_id(MemberClass::Sponsor)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(sponsor.sequence(), Some(5));
}

#[tokio::test]
async fn highest_sequential_id_ignores_degraded_ids() {
  let s = store().await;
  s.insert_profile(new_profile(MemberClass::Individual, 9, "a@example.com", "090-1111-2222"))
    .await
    .unwrap();

  let mut degraded = new_profile(MemberClass::Individual, 0, "b@example.com", "090-3333-4444");
  degraded.member_id = MemberId::degraded(MemberClass::Individual, 1_722_839_000, 42);
  s.insert_profile(degraded).await.unwrap();

  let highest = s
    .highest_sequential_id(MemberClass::Individual)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(highest.sequence(), Some(9));
}

// ─── Votes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn vote_insert_and_duplicate_same_day() {
  let s = store().await;
  let artist = seed_artist(&s, "A1").await;

  let first = s
    .insert_vote(new_vote("090-1111-2222", &artist, "2026-07-01"))
    .await
    .unwrap();
  assert!(matches!(first, VoteInsert::Recorded(_)));

  let second = s
    .insert_vote(new_vote("090-1111-2222", &artist, "2026-07-01"))
    .await
    .unwrap();
  assert!(matches!(second, VoteInsert::Duplicate));
}

#[tokio::test]
async fn vote_for_other_artist_or_day_is_not_a_duplicate() {
  let s = store().await;
  let a1 = seed_artist(&s, "A1").await;
  let a2 = seed_artist(&s, "A2").await;

  s.insert_vote(new_vote("090-1111-2222", &a1, "2026-07-01"))
    .await
    .unwrap();

  let other_artist = s
    .insert_vote(new_vote("090-1111-2222", &a2, "2026-07-01"))
    .await
    .unwrap();
  assert!(matches!(other_artist, VoteInsert::Recorded(_)));

  let next_day = s
    .insert_vote(new_vote("090-1111-2222", &a1, "2026-07-02"))
    .await
    .unwrap();
  assert!(matches!(next_day, VoteInsert::Recorded(_)));
}

#[tokio::test]
async fn concurrent_inserts_yield_exactly_one_recorded_row() {
  let s = store().await;
  let artist = seed_artist(&s, "A1").await;

  let mut handles = Vec::new();
  for _ in 0..8 {
    let s = s.clone();
    let artist = artist.clone();
    handles.push(tokio::spawn(async move {
      s.insert_vote(new_vote("090-1111-2222", &artist, "2026-07-01"))
        .await
        .unwrap()
    }));
  }

  let mut recorded = 0;
  let mut duplicate = 0;
  for handle in handles {
    match handle.await.unwrap() {
      VoteInsert::Recorded(_) => recorded += 1,
      VoteInsert::Duplicate => duplicate += 1,
    }
  }
  assert_eq!(recorded, 1);
  assert_eq!(duplicate, 7);
}

#[tokio::test]
async fn has_vote_reflects_ledger_state() {
  let s = store().await;
  let artist = seed_artist(&s, "A1").await;
  let phone = PhoneNumber::new("090-1111-2222").unwrap();
  let day: NaiveDate = "2026-07-01".parse().unwrap();

  assert!(!s.has_vote(&phone, &artist, day).await.unwrap());

  s.insert_vote(new_vote("090-1111-2222", &artist, "2026-07-01"))
    .await
    .unwrap();

  assert!(s.has_vote(&phone, &artist, day).await.unwrap());
  assert!(!s.has_vote(&phone, &artist, "2026-07-02".parse().unwrap()).await.unwrap());
}

// ─── Tallies ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn increment_points_is_cumulative_from_empty() {
  let s = store().await;
  let artist = seed_artist(&s, "A1").await;

  assert_eq!(s.read_points(&artist).await.unwrap(), 0);

  s.increment_points(&artist, 10).await.unwrap();
  s.increment_points(&artist, 10).await.unwrap();
  assert_eq!(s.read_points(&artist).await.unwrap(), 20);
}

#[tokio::test]
async fn write_points_overwrites() {
  let s = store().await;
  let artist = seed_artist(&s, "A1").await;

  s.increment_points(&artist, 30).await.unwrap();
  s.write_points(&artist, 7).await.unwrap();
  assert_eq!(s.read_points(&artist).await.unwrap(), 7);
}
