//! SQLite implementation of [`VoteStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use looks_core::{
  battle::{Battle, BattleStatus, BattleTally, BattleVote, validate_candidates},
  look::{AdminStats, Look, LookStats},
  store::VoteStore,
  vote::{Rating, Score, Verdict, YayNayTally, YayNayVote},
};

use crate::{
  Error, Result,
  encode::{
    RawBattle, RawLook, RawRating, RawStamps, RawStats, decode_count,
    decode_total, encode_dt, encode_uuid,
  },
  schema::{REFRESH_TRIGGER, SCHEMA, drop_refresh_trigger_ddl, refresh_trigger_ddl},
};

/// What the refresh transaction observed.
enum RefreshRow {
  TriggerMissing,
  LookMissing,
  Refreshed(RawStats),
}

fn look_exists(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM looks WHERE look_id = ?1",
        rusqlite::params![id],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

fn read_stamps(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawStamps> {
  Ok(RawStamps {
    created_at: row.get(0)?,
    updated_at: row.get(1)?,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A looks vote store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path`, run schema initialisation and make
  /// sure the refresh trigger is installed.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let trigger = refresh_trigger_ddl();
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(SCHEMA)?;
        conn.execute_batch(&trigger)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn read_battle(&self, id: Uuid) -> Result<Option<Battle>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawBattle> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM battles WHERE battle_id = ?1",
          RawBattle::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawBattle::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawBattle::into_battle).transpose()
  }
}

// ─── VoteStore impl ──────────────────────────────────────────────────────────

impl VoteStore for SqliteStore {
  type Error = Error;

  // ── Looks ─────────────────────────────────────────────────────────────────

  async fn add_look(&self) -> Result<Look> { self.add_look_with_id(Uuid::new_v4()).await }

  async fn add_look_with_id(&self, id: Uuid) -> Result<Look> {
    let look = Look {
      look_id:    id,
      created_at: Utc::now(),
      stats:      LookStats::default(),
    };

    let id_str = encode_uuid(look.look_id);
    let at_str = encode_dt(look.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO looks (look_id, created_at) VALUES (?1, ?2)",
          rusqlite::params![id_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(look)
  }

  async fn get_look(&self, id: Uuid) -> Result<Option<Look>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawLook> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {} FROM looks WHERE look_id = ?1", RawLook::COLUMNS);
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawLook::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawLook::into_look).transpose()
  }

  async fn list_looks(&self) -> Result<Vec<Look>> {
    let raws: Vec<RawLook> = self
      .conn
      .call(|conn| {
        let sql = format!("SELECT {} FROM looks ORDER BY created_at", RawLook::COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawLook::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLook::into_look).collect()
  }

  async fn delete_look(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM looks WHERE look_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;

    if deleted == 0 {
      return Err(Error::LookNotFound(id));
    }
    Ok(())
  }

  // ── Ratings ───────────────────────────────────────────────────────────────

  async fn upsert_rating(&self, voter_id: Uuid, look_id: Uuid, score: Score) -> Result<Rating> {
    let voter_str = encode_uuid(voter_id);
    let look_str  = encode_uuid(look_id);
    let score_val = i64::from(score.get());

    let raw: Option<RawStamps> = self
      .conn
      .call(move |conn| {
        if !look_exists(conn, &look_str)? {
          return Ok(None);
        }
        // Stamped on the connection thread so timestamps follow arrival order.
        let now = encode_dt(Utc::now());
        let stamps = conn.query_row(
          "INSERT INTO ratings (voter_id, look_id, score, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?4)
           ON CONFLICT (voter_id, look_id) DO UPDATE SET
             score      = excluded.score,
             updated_at = excluded.updated_at
           RETURNING created_at, updated_at",
          rusqlite::params![voter_str, look_str, score_val, now],
          read_stamps,
        )?;
        Ok(Some(stamps))
      })
      .await?;

    raw
      .ok_or(Error::LookNotFound(look_id))?
      .into_rating(voter_id, look_id, score)
  }

  async fn get_rating(&self, voter_id: Uuid, look_id: Uuid) -> Result<Option<Rating>> {
    let voter_str = encode_uuid(voter_id);
    let look_str  = encode_uuid(look_id);

    let raw: Option<RawRating> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM ratings WHERE voter_id = ?1 AND look_id = ?2",
          RawRating::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![voter_str, look_str], RawRating::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRating::into_rating).transpose()
  }

  async fn list_ratings(&self, look_id: Uuid) -> Result<Vec<Rating>> {
    let look_str = encode_uuid(look_id);

    let raws: Vec<RawRating> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM ratings WHERE look_id = ?1 ORDER BY voter_id",
          RawRating::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![look_str], RawRating::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRating::into_rating).collect()
  }

  // ── Aggregates ────────────────────────────────────────────────────────────

  async fn refresh_rating_aggregate(&self, look_id: Uuid) -> Result<LookStats> {
    let look_str = encode_uuid(look_id);

    let row = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let installed = tx
          .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'trigger' AND name = ?1",
            rusqlite::params![REFRESH_TRIGGER],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !installed {
          return Ok(RefreshRow::TriggerMissing);
        }

        let touched = tx.execute(
          "UPDATE looks SET stats_requested_at = ?2 WHERE look_id = ?1",
          rusqlite::params![look_str, encode_dt(Utc::now())],
        )?;
        if touched == 0 {
          return Ok(RefreshRow::LookMissing);
        }

        let stats = tx.query_row(
          "SELECT rating_count, rating_sum, avg_rating, top_rated
           FROM looks WHERE look_id = ?1",
          rusqlite::params![look_str],
          |row| {
            Ok(RawStats {
              rating_count: row.get(0)?,
              rating_sum:   row.get(1)?,
              avg_rating:   row.get(2)?,
              top_rated:    row.get(3)?,
            })
          },
        )?;
        tx.commit()?;
        Ok(RefreshRow::Refreshed(stats))
      })
      .await?;

    match row {
      RefreshRow::TriggerMissing => Err(Error::RefreshTriggerMissing(REFRESH_TRIGGER)),
      RefreshRow::LookMissing => Err(Error::LookNotFound(look_id)),
      RefreshRow::Refreshed(raw) => raw.into_stats(),
    }
  }

  async fn write_look_stats(&self, look_id: Uuid, stats: LookStats) -> Result<()> {
    let look_str = encode_uuid(look_id);

    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE looks SET
             rating_count = ?2,
             rating_sum   = ?3,
             avg_rating   = ?4,
             top_rated    = ?5
           WHERE look_id = ?1",
          rusqlite::params![
            look_str,
            stats.rating_count,
            stats.rating_sum,
            stats.avg_rating,
            stats.top_rated,
          ],
        )?)
      })
      .await?;

    if updated == 0 {
      return Err(Error::LookNotFound(look_id));
    }
    Ok(())
  }

  async fn recreate_triggers(&self) -> Result<Vec<String>> {
    let drop   = drop_refresh_trigger_ddl();
    let create = refresh_trigger_ddl();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute_batch(&drop)?;
        tx.execute_batch(&create)?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::info!(trigger = REFRESH_TRIGGER, "reinstalled aggregate refresh trigger");
    Ok(vec![REFRESH_TRIGGER.to_owned()])
  }

  async fn drop_triggers(&self) -> Result<()> {
    let drop = drop_refresh_trigger_ddl();
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&drop)?;
        Ok(())
      })
      .await?;

    tracing::warn!(trigger = REFRESH_TRIGGER, "dropped aggregate refresh trigger");
    Ok(())
  }

  async fn admin_stats(&self) -> Result<AdminStats> {
    let (total, rated, ratings, max, top): (i64, i64, i64, i64, i64) = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT
             COUNT(*),
             COALESCE(SUM(rating_count > 0), 0),
             COALESCE(SUM(rating_count), 0),
             COALESCE(MAX(rating_count), 0),
             COALESCE(SUM(top_rated != 0), 0)
           FROM looks",
          [],
          |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )?)
      })
      .await?;

    Ok(AdminStats::from_counts(
      decode_total(total, "total_looks")?,
      decode_total(rated, "rated_looks")?,
      decode_total(ratings, "total_ratings")?,
      decode_count(max, "max_ratings_on_look")?,
      decode_total(top, "top_rated_count")?,
    ))
  }

  // ── Battles ───────────────────────────────────────────────────────────────

  async fn create_battle(&self, look_a: Uuid, look_b: Uuid) -> Result<Battle> {
    validate_candidates(look_a, look_b)?;

    let battle = Battle {
      battle_id:    Uuid::new_v4(),
      look_a,
      look_b,
      status:       BattleStatus::Active,
      created_at:   Utc::now(),
      completed_at: None,
    };

    let id_str     = encode_uuid(battle.battle_id);
    let a_str      = encode_uuid(look_a);
    let b_str      = encode_uuid(look_b);
    let status_str = battle.status.as_ref().to_owned();
    let at_str     = encode_dt(battle.created_at);

    let missing: Option<Uuid> = self
      .conn
      .call(move |conn| {
        if !look_exists(conn, &a_str)? {
          return Ok(Some(look_a));
        }
        if !look_exists(conn, &b_str)? {
          return Ok(Some(look_b));
        }
        conn.execute(
          "INSERT INTO battles (battle_id, look_a, look_b, status, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, a_str, b_str, status_str, at_str],
        )?;
        Ok(None)
      })
      .await?;

    match missing {
      Some(id) => Err(Error::LookNotFound(id)),
      None => Ok(battle),
    }
  }

  async fn get_battle(&self, id: Uuid) -> Result<Option<Battle>> { self.read_battle(id).await }

  async fn complete_battle(&self, id: Uuid) -> Result<Battle> {
    let id_str = encode_uuid(id);
    let status = BattleStatus::Completed.as_ref().to_owned();
    let at_str = encode_dt(Utc::now());

    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE battles SET
             status       = ?2,
             completed_at = COALESCE(completed_at, ?3)
           WHERE battle_id = ?1",
          rusqlite::params![id_str, status, at_str],
        )?)
      })
      .await?;

    if updated == 0 {
      return Err(Error::BattleNotFound(id));
    }
    self.read_battle(id).await?.ok_or(Error::BattleNotFound(id))
  }

  async fn upsert_battle_vote(
    &self,
    voter_id:       Uuid,
    battle_id:      Uuid,
    chosen_look_id: Uuid,
  ) -> Result<BattleVote> {
    let voter_str  = encode_uuid(voter_id);
    let battle_str = encode_uuid(battle_id);
    let chosen_str = encode_uuid(chosen_look_id);

    let raw: Option<RawStamps> = self
      .conn
      .call(move |conn| {
        let exists = conn
          .query_row(
            "SELECT 1 FROM battles WHERE battle_id = ?1",
            rusqlite::params![battle_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(None);
        }
        let now = encode_dt(Utc::now());
        let stamps = conn.query_row(
          "INSERT INTO battle_votes (voter_id, battle_id, chosen_look_id, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?4)
           ON CONFLICT (voter_id, battle_id) DO UPDATE SET
             chosen_look_id = excluded.chosen_look_id,
             updated_at     = excluded.updated_at
           RETURNING created_at, updated_at",
          rusqlite::params![voter_str, battle_str, chosen_str, now],
          read_stamps,
        )?;
        Ok(Some(stamps))
      })
      .await?;

    raw
      .ok_or(Error::BattleNotFound(battle_id))?
      .into_battle_vote(voter_id, battle_id, chosen_look_id)
  }

  async fn battle_tally(&self, battle_id: Uuid) -> Result<BattleTally> {
    let battle = self
      .read_battle(battle_id)
      .await?
      .ok_or(Error::BattleNotFound(battle_id))?;

    let battle_str = encode_uuid(battle_id);
    let a_str      = encode_uuid(battle.look_a);
    let b_str      = encode_uuid(battle.look_b);

    let (votes_a, votes_b): (i64, i64) = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT
             COALESCE(SUM(chosen_look_id = ?2), 0),
             COALESCE(SUM(chosen_look_id = ?3), 0)
           FROM battle_votes WHERE battle_id = ?1",
          rusqlite::params![battle_str, a_str, b_str],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )?)
      })
      .await?;

    Ok(BattleTally {
      battle_id,
      look_a: battle.look_a,
      votes_a: decode_total(votes_a, "votes_a")?,
      look_b: battle.look_b,
      votes_b: decode_total(votes_b, "votes_b")?,
    })
  }

  // ── Yay / nay ─────────────────────────────────────────────────────────────

  async fn upsert_yay_nay(
    &self,
    voter_id: Uuid,
    look_id:  Uuid,
    verdict:  Verdict,
  ) -> Result<YayNayVote> {
    let voter_str   = encode_uuid(voter_id);
    let look_str    = encode_uuid(look_id);
    let verdict_str = verdict.as_ref().to_owned();

    let raw: Option<RawStamps> = self
      .conn
      .call(move |conn| {
        if !look_exists(conn, &look_str)? {
          return Ok(None);
        }
        let now = encode_dt(Utc::now());
        let stamps = conn.query_row(
          "INSERT INTO yay_nay_votes (voter_id, look_id, verdict, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?4)
           ON CONFLICT (voter_id, look_id) DO UPDATE SET
             verdict    = excluded.verdict,
             updated_at = excluded.updated_at
           RETURNING created_at, updated_at",
          rusqlite::params![voter_str, look_str, verdict_str, now],
          read_stamps,
        )?;
        Ok(Some(stamps))
      })
      .await?;

    raw
      .ok_or(Error::LookNotFound(look_id))?
      .into_yay_nay(voter_id, look_id, verdict)
  }

  async fn yay_nay_tally(&self, look_id: Uuid) -> Result<YayNayTally> {
    let look_str = encode_uuid(look_id);

    let counts: Option<(i64, i64)> = self
      .conn
      .call(move |conn| {
        if !look_exists(conn, &look_str)? {
          return Ok(None);
        }
        Ok(Some(conn.query_row(
          "SELECT
             COALESCE(SUM(verdict = 'yay'), 0),
             COALESCE(SUM(verdict = 'nay'), 0)
           FROM yay_nay_votes WHERE look_id = ?1",
          rusqlite::params![look_str],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )?))
      })
      .await?;

    let (yay, nay) = counts.ok_or(Error::LookNotFound(look_id))?;
    Ok(YayNayTally {
      look_id,
      yay: decode_total(yay, "yay")?,
      nay: decode_total(nay, "nay")?,
    })
  }
}
