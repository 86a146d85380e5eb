//! The three voting protocols.
//!
//! | Protocol | Key | Aggregate |
//! |----------|-----|-----------|
//! | rating   | `(voter, look)`   | denormalized on the look; refreshed by the store, repaired by reconciliation |
//! | battle   | `(voter, battle)` | tally computed on read |
//! | yay/nay  | `(voter, look)`   | tally computed on read |
//!
//! A vote whose upsert fails is reported to the caller. Once the upsert has
//! succeeded the vote is accepted: a rating whose aggregate refresh fails is
//! staged in the fallback cache, and a failed tally read leaves the tally out
//! of the response.

use std::{future::Future, sync::Arc, time::Duration};

use looks_core::{
  battle::{Battle, BattleOutcome, BattleStatus, BattleTally, BattleVote},
  look::{Look, LookStats},
  store::{StoreFailure, VoteStore},
  vote::{Rating, Score, Verdict, YayNayTally, YayNayVote},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Result, VoteError,
  cache::{FallbackCache, FallbackEntry},
  reconcile::Reconciler,
};

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Which path a rating's aggregate took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatePath {
  /// The store refreshed the look's stats.
  Authoritative,
  /// The refresh failed; the rating is staged until the next reconciliation.
  Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingOutcome {
  pub record: Rating,
  /// Fresh stats, absent when the rating went down the fallback path.
  pub stats:  Option<LookStats>,
  pub path:   AggregatePath,
}

/// A battle with its current tally and outcome.
#[derive(Debug, Clone, Serialize)]
pub struct BattleStanding {
  pub battle:  Battle,
  pub tally:   BattleTally,
  pub outcome: BattleOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct BattleBallot {
  pub record:   BattleVote,
  /// Absent when the tally could not be read after the ballot was stored.
  pub standing: Option<BattleStanding>,
}

#[derive(Debug, Clone, Serialize)]
pub struct YayNayBallot {
  pub record: YayNayVote,
  /// Absent when the tally could not be read after the vote was stored.
  pub tally:  Option<YayNayTally>,
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct VotingService<S: VoteStore> {
  store:         Arc<S>,
  cache:         Arc<FallbackCache>,
  reconciler:    Reconciler<S>,
  store_timeout: Duration,
}

impl<S: VoteStore> Clone for VotingService<S> {
  fn clone(&self) -> Self {
    Self {
      store:         self.store.clone(),
      cache:         self.cache.clone(),
      reconciler:    self.reconciler.clone(),
      store_timeout: self.store_timeout,
    }
  }
}

impl<S: VoteStore> VotingService<S> {
  pub fn new(
    store: Arc<S>,
    cache: Arc<FallbackCache>,
    reconciler: Reconciler<S>,
    store_timeout: Duration,
  ) -> Self {
    Self { store, cache, reconciler, store_timeout }
  }

  /// Run a store call under the configured timeout. A timeout counts as the
  /// store being unavailable.
  async fn bounded<T, E, F>(&self, call: F) -> Result<T>
  where
    E: StoreFailure,
    F: Future<Output = Result<T, E>>,
  {
    match tokio::time::timeout(self.store_timeout, call).await {
      Ok(result) => result.map_err(VoteError::store),
      Err(elapsed) => Err(VoteError::StoreUnavailable(Box::new(elapsed))),
    }
  }

  // ── Rating ────────────────────────────────────────────────────────────────

  /// Record `raw_score` for `(voter_id, look_id)`.
  pub async fn rate(&self, voter_id: Uuid, look_id: Uuid, raw_score: i64) -> Result<RatingOutcome> {
    let score =
      Score::try_from(raw_score).map_err(|e| VoteError::InvalidInput(e.to_string()))?;

    let record = self
      .bounded(self.store.upsert_rating(voter_id, look_id, score))
      .await?;
    tracing::debug!(%voter_id, %look_id, score = score.get(), "rating recorded");

    match self.refresh(look_id).await {
      Ok(stats) => Ok(RatingOutcome {
        record,
        stats: Some(stats),
        path: AggregatePath::Authoritative,
      }),
      Err(err) => {
        tracing::warn!(
          %voter_id,
          %look_id,
          error = %err,
          "absorbing rating into fallback cache"
        );
        if let Err(snapshot_err) = self.cache.absorb(FallbackEntry::from(record.clone())).await {
          tracing::warn!(error = %snapshot_err, "fallback snapshot failed");
        }
        Ok(RatingOutcome { record, stats: None, path: AggregatePath::Fallback })
      }
    }
  }

  /// Refresh a look's stats through the store. If the cache still holds
  /// staged ratings for the look, fold them in too so the refresh does not
  /// hide them.
  async fn refresh(&self, look_id: Uuid) -> Result<LookStats> {
    let refresh_failed = |source: Box<dyn std::error::Error + Send + Sync>| {
      VoteError::AggregateRefreshFailed { look_id, source }
    };

    let _guard = self.reconciler.lock_look(look_id).await;
    let stats = match tokio::time::timeout(
      self.store_timeout,
      self.store.refresh_rating_aggregate(look_id),
    )
    .await
    {
      Ok(Ok(stats)) => stats,
      Ok(Err(e)) => return Err(refresh_failed(Box::new(e))),
      Err(elapsed) => return Err(refresh_failed(Box::new(elapsed))),
    };

    if self.cache.has_entries_for(look_id).await {
      return self
        .reconciler
        .reconcile_locked(look_id)
        .await
        .map_err(|e| refresh_failed(Box::new(e)));
    }
    Ok(stats)
  }

  // ── Battle ────────────────────────────────────────────────────────────────

  /// Cast or switch `voter_id`'s ballot in `battle_id`.
  pub async fn vote_battle(
    &self,
    voter_id: Uuid,
    battle_id: Uuid,
    chosen_look_id: Uuid,
  ) -> Result<BattleBallot> {
    let battle = self
      .bounded(self.store.get_battle(battle_id))
      .await?
      .ok_or_else(|| VoteError::NotFound(format!("battle {battle_id}")))?;

    if battle.status == BattleStatus::Completed {
      return Err(VoteError::BattleClosed(battle_id));
    }
    battle
      .ensure_candidate(chosen_look_id)
      .map_err(|_| VoteError::InvalidCandidate { look_id: chosen_look_id, battle_id })?;

    let record = self
      .bounded(self.store.upsert_battle_vote(voter_id, battle_id, chosen_look_id))
      .await?;
    tracing::debug!(%voter_id, %battle_id, %chosen_look_id, "battle ballot recorded");

    let standing = self
      .standing_of(battle)
      .await
      .inspect_err(|err| {
        tracing::warn!(%battle_id, error = %err, "ballot stored but tally read failed");
      })
      .ok();
    Ok(BattleBallot { record, standing })
  }

  pub async fn battle_standing(&self, battle_id: Uuid) -> Result<BattleStanding> {
    let battle = self
      .bounded(self.store.get_battle(battle_id))
      .await?
      .ok_or_else(|| VoteError::NotFound(format!("battle {battle_id}")))?;
    self.standing_of(battle).await
  }

  async fn standing_of(&self, battle: Battle) -> Result<BattleStanding> {
    let tally = self.bounded(self.store.battle_tally(battle.battle_id)).await?;
    let outcome = battle.outcome(&tally);
    Ok(BattleStanding { battle, tally, outcome })
  }

  // ── Yay / nay ─────────────────────────────────────────────────────────────

  pub async fn vote_yay_nay(
    &self,
    voter_id: Uuid,
    look_id: Uuid,
    verdict: Verdict,
  ) -> Result<YayNayBallot> {
    let record = self
      .bounded(self.store.upsert_yay_nay(voter_id, look_id, verdict))
      .await?;
    tracing::debug!(%voter_id, %look_id, %verdict, "yay/nay recorded");

    let tally = self
      .yay_nay_tally(look_id)
      .await
      .inspect_err(|err| {
        tracing::warn!(%look_id, error = %err, "yay/nay stored but tally read failed");
      })
      .ok();
    Ok(YayNayBallot { record, tally })
  }

  pub async fn yay_nay_tally(&self, look_id: Uuid) -> Result<YayNayTally> {
    self.bounded(self.store.yay_nay_tally(look_id)).await
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// The look's current denormalized stats. Does not reconcile.
  pub async fn look_stats(&self, look_id: Uuid) -> Result<Look> {
    self
      .bounded(self.store.get_look(look_id))
      .await?
      .ok_or_else(|| VoteError::NotFound(format!("look {look_id}")))
  }
}
