//! SQL schema for the Ovation SQLite store.
//!
//! The UNIQUE constraints are load-bearing: member-id allocation, the
//! one-profile-per-subject invariant, the cross-signup email check's
//! backstop, and the one-vote-per-identity-per-artist-per-day rule all rely
//! on them rather than on any in-process coordination.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS individual_members (
    member_id        TEXT PRIMARY KEY,
    subject_id       TEXT NOT NULL UNIQUE,
    email            TEXT NOT NULL UNIQUE,
    family_name      TEXT NOT NULL,
    given_name       TEXT NOT NULL,
    family_name_kana TEXT,
    given_name_kana  TEXT,
    birth_date       TEXT NOT NULL,    -- ISO 8601 date
    gender           TEXT NOT NULL,    -- 'female' | 'male' | 'other' | 'no_answer'
    phone            TEXT NOT NULL,    -- normalized digits
    nickname         TEXT,
    created_at       TEXT NOT NULL     -- ISO 8601 UTC; server-assigned
);

CREATE TABLE IF NOT EXISTS sponsor_members (
    member_id       TEXT PRIMARY KEY,
    subject_id      TEXT NOT NULL UNIQUE,
    email           TEXT NOT NULL UNIQUE,
    family_name     TEXT NOT NULL,
    given_name      TEXT NOT NULL,
    company_name    TEXT NOT NULL,
    company_address TEXT,
    department      TEXT,
    position        TEXT,
    contact_phone   TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS artists (
    artist_id TEXT PRIMARY KEY,
    name      TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);

-- Votes are append-only. No UPDATE is ever issued against this table except
-- the external moderation pass over is_approved.
CREATE TABLE IF NOT EXISTS votes (
    vote_id     TEXT PRIMARY KEY,
    artist_id   TEXT NOT NULL REFERENCES artists(artist_id),
    voter_key   TEXT NOT NULL,    -- normalized phone digits
    subject_id  TEXT,             -- provenance; not part of the unique key
    voter_name  TEXT NOT NULL,
    message     TEXT,
    vote_date   TEXT NOT NULL,    -- contest-local ISO 8601 date
    created_at  TEXT NOT NULL,
    is_approved INTEGER NOT NULL DEFAULT 1,
    UNIQUE (voter_key, artist_id, vote_date)
);

CREATE TABLE IF NOT EXISTS artist_tallies (
    artist_id TEXT PRIMARY KEY REFERENCES artists(artist_id),
    points    INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS votes_artist_idx ON votes(artist_id);
CREATE INDEX IF NOT EXISTS votes_date_idx   ON votes(vote_date);

PRAGMA user_version = 1;
";
