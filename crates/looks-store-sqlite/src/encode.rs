//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Enums are stored as their snake_case names.

use chrono::{DateTime, Utc};
use looks_core::{
  battle::{Battle, BattleStatus, BattleVote},
  look::{Look, LookStats},
  vote::{Rating, Score, Verdict, YayNayVote},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Counters ────────────────────────────────────────────────────────────────

pub fn decode_count(raw: i64, column: &str) -> Result<u32> {
  u32::try_from(raw).map_err(|_| Error::Decode(format!("{column} = {raw}")))
}

pub fn decode_total(raw: i64, column: &str) -> Result<u64> {
  u64::try_from(raw).map_err(|_| Error::Decode(format!("{column} = {raw}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read from the rating columns of a `looks` row.
pub struct RawStats {
  pub rating_count: i64,
  pub rating_sum:   i64,
  pub avg_rating:   f64,
  pub top_rated:    bool,
}

impl RawStats {
  pub fn into_stats(self) -> Result<LookStats> {
    Ok(LookStats {
      rating_count: decode_count(self.rating_count, "rating_count")?,
      rating_sum:   decode_count(self.rating_sum, "rating_sum")?,
      avg_rating:   self.avg_rating,
      top_rated:    self.top_rated,
    })
  }
}

/// Raw values read directly from a `looks` row.
pub struct RawLook {
  pub look_id:    String,
  pub created_at: String,
  pub stats:      RawStats,
}

impl RawLook {
  pub const COLUMNS: &'static str =
    "look_id, created_at, rating_count, rating_sum, avg_rating, top_rated";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      look_id:    row.get(0)?,
      created_at: row.get(1)?,
      stats:      RawStats {
        rating_count: row.get(2)?,
        rating_sum:   row.get(3)?,
        avg_rating:   row.get(4)?,
        top_rated:    row.get(5)?,
      },
    })
  }

  pub fn into_look(self) -> Result<Look> {
    Ok(Look {
      look_id:    decode_uuid(&self.look_id)?,
      created_at: decode_dt(&self.created_at)?,
      stats:      self.stats.into_stats()?,
    })
  }
}

/// Raw values read directly from a `ratings` row.
pub struct RawRating {
  pub voter_id:   String,
  pub look_id:    String,
  pub score:      i64,
  pub created_at: String,
  pub updated_at: String,
}

impl RawRating {
  pub const COLUMNS: &'static str = "voter_id, look_id, score, created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      voter_id:   row.get(0)?,
      look_id:    row.get(1)?,
      score:      row.get(2)?,
      created_at: row.get(3)?,
      updated_at: row.get(4)?,
    })
  }

  pub fn into_rating(self) -> Result<Rating> {
    Ok(Rating {
      voter_id:   decode_uuid(&self.voter_id)?,
      look_id:    decode_uuid(&self.look_id)?,
      score:      Score::try_from(self.score)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `battles` row.
pub struct RawBattle {
  pub battle_id:    String,
  pub look_a:       String,
  pub look_b:       String,
  pub status:       String,
  pub created_at:   String,
  pub completed_at: Option<String>,
}

impl RawBattle {
  pub const COLUMNS: &'static str =
    "battle_id, look_a, look_b, status, created_at, completed_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      battle_id:    row.get(0)?,
      look_a:       row.get(1)?,
      look_b:       row.get(2)?,
      status:       row.get(3)?,
      created_at:   row.get(4)?,
      completed_at: row.get(5)?,
    })
  }

  pub fn into_battle(self) -> Result<Battle> {
    Ok(Battle {
      battle_id:    decode_uuid(&self.battle_id)?,
      look_a:       decode_uuid(&self.look_a)?,
      look_b:       decode_uuid(&self.look_b)?,
      status:       BattleStatus::parse(&self.status)?,
      created_at:   decode_dt(&self.created_at)?,
      completed_at: self.completed_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Timestamps returned by an upsert's `RETURNING` clause.
pub struct RawStamps {
  pub created_at: String,
  pub updated_at: String,
}

impl RawStamps {
  pub fn decode(&self) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    Ok((decode_dt(&self.created_at)?, decode_dt(&self.updated_at)?))
  }

  pub fn into_battle_vote(
    self,
    voter_id: Uuid,
    battle_id: Uuid,
    chosen_look_id: Uuid,
  ) -> Result<BattleVote> {
    let (created_at, updated_at) = self.decode()?;
    Ok(BattleVote { voter_id, battle_id, chosen_look_id, created_at, updated_at })
  }

  pub fn into_yay_nay(
    self,
    voter_id: Uuid,
    look_id: Uuid,
    verdict: Verdict,
  ) -> Result<YayNayVote> {
    let (created_at, updated_at) = self.decode()?;
    Ok(YayNayVote { voter_id, look_id, verdict, created_at, updated_at })
  }

  pub fn into_rating(self, voter_id: Uuid, look_id: Uuid, score: Score) -> Result<Rating> {
    let (created_at, updated_at) = self.decode()?;
    Ok(Rating { voter_id, look_id, score, created_at, updated_at })
  }
}
