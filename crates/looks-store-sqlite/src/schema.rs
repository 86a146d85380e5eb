//! SQL schema for the looks SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

use looks_core::look::{TOP_RATED_MIN_AVG_HUNDREDTHS, TOP_RATED_MIN_RATINGS};

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Identity is owned by upload/delete flows; only the rating columns are
-- written by this store.
CREATE TABLE IF NOT EXISTS looks (
    look_id            TEXT PRIMARY KEY,
    created_at         TEXT NOT NULL,
    rating_count       INTEGER NOT NULL DEFAULT 0,
    rating_sum         INTEGER NOT NULL DEFAULT 0,
    avg_rating         REAL    NOT NULL DEFAULT 0.0,
    top_rated          INTEGER NOT NULL DEFAULT 0,
    stats_requested_at TEXT              -- touched to fire the refresh trigger
);

-- One row per (voter, look); resubmission updates in place.
CREATE TABLE IF NOT EXISTS ratings (
    voter_id   TEXT    NOT NULL,
    look_id    TEXT    NOT NULL REFERENCES looks(look_id) ON DELETE CASCADE,
    score      INTEGER NOT NULL CHECK (score BETWEEN 1 AND 5),
    created_at TEXT    NOT NULL,
    updated_at TEXT    NOT NULL,
    PRIMARY KEY (voter_id, look_id)
);

CREATE TABLE IF NOT EXISTS battles (
    battle_id    TEXT PRIMARY KEY,
    look_a       TEXT NOT NULL REFERENCES looks(look_id) ON DELETE CASCADE,
    look_b       TEXT NOT NULL REFERENCES looks(look_id) ON DELETE CASCADE,
    status       TEXT NOT NULL DEFAULT 'active',   -- 'active' | 'completed'
    created_at   TEXT NOT NULL,
    completed_at TEXT,
    CHECK (look_a != look_b)
);

-- One ballot per (voter, battle); switching sides replaces the ballot.
CREATE TABLE IF NOT EXISTS battle_votes (
    voter_id       TEXT NOT NULL,
    battle_id      TEXT NOT NULL REFERENCES battles(battle_id) ON DELETE CASCADE,
    chosen_look_id TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    PRIMARY KEY (voter_id, battle_id)
);

CREATE TABLE IF NOT EXISTS yay_nay_votes (
    voter_id   TEXT NOT NULL,
    look_id    TEXT NOT NULL REFERENCES looks(look_id) ON DELETE CASCADE,
    verdict    TEXT NOT NULL CHECK (verdict IN ('yay', 'nay')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (voter_id, look_id)
);

CREATE INDEX IF NOT EXISTS ratings_look_idx        ON ratings(look_id);
CREATE INDEX IF NOT EXISTS battle_votes_battle_idx ON battle_votes(battle_id);
CREATE INDEX IF NOT EXISTS yay_nay_look_idx        ON yay_nay_votes(look_id);

PRAGMA user_version = 1;
";

/// Name of the trigger that recomputes a look's rating columns.
pub const REFRESH_TRIGGER: &str = "looks_refresh_rating_stats";

/// DDL for the aggregate-refresh trigger.
///
/// Fires when `stats_requested_at` is touched and recomputes the look's
/// rating columns from `ratings`. The average uses the same half-up
/// hundredths formula as [`looks_core::look::round_half_up_hundredths`].
pub fn refresh_trigger_ddl() -> String {
  format!(
    "CREATE TRIGGER IF NOT EXISTS {REFRESH_TRIGGER}
AFTER UPDATE OF stats_requested_at ON looks
BEGIN
    UPDATE looks SET
        rating_count = (SELECT COUNT(*) FROM ratings WHERE look_id = NEW.look_id),
        rating_sum   = (SELECT COALESCE(SUM(score), 0) FROM ratings WHERE look_id = NEW.look_id)
    WHERE look_id = NEW.look_id;

    UPDATE looks SET
        avg_rating = CASE
            WHEN rating_count = 0 THEN 0.0
            ELSE ((200 * rating_sum + rating_count) / (2 * rating_count)) / 100.0
        END,
        top_rated = CASE
            WHEN rating_count >= {TOP_RATED_MIN_RATINGS}
             AND (200 * rating_sum + rating_count) / (2 * rating_count) >= {TOP_RATED_MIN_AVG_HUNDREDTHS}
            THEN 1 ELSE 0
        END
    WHERE look_id = NEW.look_id;
END;"
  )
}

pub fn drop_refresh_trigger_ddl() -> String {
  format!("DROP TRIGGER IF EXISTS {REFRESH_TRIGGER};")
}
