//! The reconciliation engine.
//!
//! A look's stats are recomputed from the union of its authoritative ratings
//! and its fallback entries, deduplicated per voter. A fallback entry wins
//! over the authoritative row for the same voter unless that row was updated
//! strictly later. Because every pass recomputes from full sets rather than
//! adding deltas, running it again with no new writes yields the same stats.

use std::{
  collections::{BTreeMap, HashMap},
  sync::Arc,
};

use chrono::{DateTime, Utc};
use looks_core::{
  look::LookStats,
  store::VoteStore,
  vote::{Rating, Score},
};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
  Result, VoteError,
  cache::{FallbackCache, FallbackEntry},
};

/// Merge authoritative ratings with staged entries into one score per voter.
pub fn merge_ratings(ratings: &[Rating], pending: &[FallbackEntry]) -> LookStats {
  let mut by_voter: BTreeMap<Uuid, (Score, DateTime<Utc>)> = ratings
    .iter()
    .map(|r| (r.voter_id, (r.score, r.updated_at)))
    .collect();

  for entry in pending {
    match by_voter.get(&entry.voter_id) {
      Some((_, authoritative_at)) if *authoritative_at > entry.updated_at => {}
      _ => {
        by_voter.insert(entry.voter_id, (entry.score, entry.updated_at));
      }
    }
  }

  LookStats::from_scores(by_voter.into_values().map(|(score, _)| score))
}

/// A look that a sync pass could not reconcile.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedLook {
  pub look_id: Uuid,
  pub reason:  String,
}

/// Result of [`Reconciler::reconcile_all`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
  pub synced_count: usize,
  pub skipped:      Vec<SkippedLook>,
}

/// One lock per look. Every write of a look's stats happens under its lock,
/// so a read-compute-write cycle never lands on top of a newer one.
#[derive(Default)]
struct LookLocks {
  locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl LookLocks {
  async fn acquire(&self, look_id: Uuid) -> OwnedMutexGuard<()> {
    let lock = {
      let mut locks = self.locks.lock().await;
      // Only the map holds an idle lock.
      locks.retain(|_, lock| Arc::strong_count(lock) > 1);
      locks.entry(look_id).or_default().clone()
    };
    lock.lock_owned().await
  }
}

pub struct Reconciler<S: VoteStore> {
  store: Arc<S>,
  cache: Arc<FallbackCache>,
  locks: Arc<LookLocks>,
}

impl<S: VoteStore> Clone for Reconciler<S> {
  fn clone(&self) -> Self {
    Self {
      store: self.store.clone(),
      cache: self.cache.clone(),
      locks: self.locks.clone(),
    }
  }
}

impl<S: VoteStore> Reconciler<S> {
  pub fn new(store: Arc<S>, cache: Arc<FallbackCache>) -> Self {
    Self { store, cache, locks: Arc::default() }
  }

  /// Hold `look_id`'s stats lock. Anything else that writes the look's stats
  /// (the store's own refresh included) must run under this guard.
  pub async fn lock_look(&self, look_id: Uuid) -> OwnedMutexGuard<()> {
    self.locks.acquire(look_id).await
  }

  /// Recompute and write back the stats for one look.
  pub async fn reconcile(&self, look_id: Uuid) -> Result<LookStats> {
    let _guard = self.lock_look(look_id).await;
    self.reconcile_locked(look_id).await
  }

  /// [`Reconciler::reconcile`] for a caller already holding the look's lock.
  pub(crate) async fn reconcile_locked(&self, look_id: Uuid) -> Result<LookStats> {
    let ratings = self
      .store
      .list_ratings(look_id)
      .await
      .map_err(VoteError::store)?;
    let pending = self.cache.entries_for(look_id).await;

    let stats = merge_ratings(&ratings, &pending);
    self
      .store
      .write_look_stats(look_id, stats)
      .await
      .map_err(VoteError::store)?;
    self.cache.mark_reconciled(&pending, Utc::now()).await;

    tracing::debug!(
      %look_id,
      authoritative = ratings.len(),
      pending = pending.len(),
      rating_count = stats.rating_count,
      avg_rating = stats.avg_rating,
      "reconciled look"
    );
    Ok(stats)
  }

  /// Reconcile every look referenced by the fallback cache. A failure on one
  /// look is logged and recorded; the pass continues with the rest.
  pub async fn reconcile_all(&self) -> SyncReport {
    let mut report = SyncReport::default();

    for look_id in self.cache.look_ids().await {
      match self.reconcile(look_id).await {
        Ok(_) => report.synced_count += 1,
        Err(err) => {
          tracing::warn!(%look_id, error = %err, "skipping look during reconciliation");
          report.skipped.push(SkippedLook { look_id, reason: err.to_string() });
        }
      }
    }

    tracing::info!(
      synced = report.synced_count,
      skipped = report.skipped.len(),
      "reconciliation pass finished"
    );
    report
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;
  use looks_store_sqlite::SqliteStore;

  fn score(raw: i64) -> Score { Score::try_from(raw).unwrap() }

  async fn setup() -> (Arc<SqliteStore>, Arc<FallbackCache>, Reconciler<SqliteStore>) {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let cache = Arc::new(FallbackCache::in_memory());
    let reconciler = Reconciler::new(store.clone(), cache.clone());
    (store, cache, reconciler)
  }

  fn staged(rating: &Rating, raw: i64, offset: Duration) -> FallbackEntry {
    FallbackEntry {
      score: score(raw),
      updated_at: rating.updated_at + offset,
      ..FallbackEntry::from(rating.clone())
    }
  }

  #[tokio::test]
  async fn newer_fallback_entry_takes_precedence() {
    let (store, cache, reconciler) = setup().await;
    let look = store.add_look().await.unwrap();
    let voter = Uuid::new_v4();

    let rating = store.upsert_rating(voter, look.look_id, score(2)).await.unwrap();
    cache.absorb(staged(&rating, 5, Duration::seconds(1))).await.unwrap();

    let stats = reconciler.reconcile(look.look_id).await.unwrap();
    assert_eq!(stats.rating_count, 1);
    assert_eq!(stats.avg_rating, 5.0);
  }

  #[tokio::test]
  async fn fallback_wins_on_equal_timestamps() {
    let (store, cache, reconciler) = setup().await;
    let look = store.add_look().await.unwrap();

    let rating = store
      .upsert_rating(Uuid::new_v4(), look.look_id, score(1))
      .await
      .unwrap();
    cache.absorb(staged(&rating, 4, Duration::zero())).await.unwrap();

    let stats = reconciler.reconcile(look.look_id).await.unwrap();
    assert_eq!((stats.rating_count, stats.rating_sum), (1, 4));
  }

  #[tokio::test]
  async fn strictly_newer_authoritative_row_wins() {
    let (store, cache, reconciler) = setup().await;
    let look = store.add_look().await.unwrap();

    let rating = store
      .upsert_rating(Uuid::new_v4(), look.look_id, score(3))
      .await
      .unwrap();
    cache.absorb(staged(&rating, 5, -Duration::seconds(1))).await.unwrap();

    let stats = reconciler.reconcile(look.look_id).await.unwrap();
    assert_eq!((stats.rating_count, stats.rating_sum), (1, 3));
  }

  #[tokio::test]
  async fn reconcile_all_is_idempotent() {
    let (store, cache, reconciler) = setup().await;
    let a = store.add_look().await.unwrap();
    let b = store.add_look().await.unwrap();

    for (look_id, raw) in [(a.look_id, 4), (a.look_id, 5), (b.look_id, 2)] {
      let rating = store
        .upsert_rating(Uuid::new_v4(), look_id, score(raw))
        .await
        .unwrap();
      cache.absorb(FallbackEntry::from(rating)).await.unwrap();
    }

    let first = reconciler.reconcile_all().await;
    let stats_a = store.get_look(a.look_id).await.unwrap().unwrap().stats;
    let stats_b = store.get_look(b.look_id).await.unwrap().unwrap().stats;

    let second = reconciler.reconcile_all().await;
    assert_eq!(first.synced_count, 2);
    assert_eq!(second.synced_count, 2);
    assert_eq!(store.get_look(a.look_id).await.unwrap().unwrap().stats, stats_a);
    assert_eq!(store.get_look(b.look_id).await.unwrap().unwrap().stats, stats_b);
    assert_eq!((stats_a.rating_count, stats_a.avg_rating), (2, 4.5));
    assert_eq!((stats_b.rating_count, stats_b.avg_rating), (1, 2.0));
  }

  #[tokio::test]
  async fn vanished_look_is_skipped_not_fatal() {
    let (store, cache, reconciler) = setup().await;
    let kept = store.add_look().await.unwrap();
    let gone = store.add_look().await.unwrap();

    for look_id in [kept.look_id, gone.look_id] {
      let rating = store
        .upsert_rating(Uuid::new_v4(), look_id, score(4))
        .await
        .unwrap();
      cache.absorb(FallbackEntry::from(rating)).await.unwrap();
    }
    store.delete_look(gone.look_id).await.unwrap();

    let report = reconciler.reconcile_all().await;
    assert_eq!(report.synced_count, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].look_id, gone.look_id);
    assert_eq!(
      store.get_look(kept.look_id).await.unwrap().unwrap().stats.rating_count,
      1
    );
  }

  #[tokio::test]
  async fn reconciled_entries_are_stamped_and_kept() {
    let (store, cache, reconciler) = setup().await;
    let look = store.add_look().await.unwrap();
    let rating = store
      .upsert_rating(Uuid::new_v4(), look.look_id, score(3))
      .await
      .unwrap();
    cache.absorb(FallbackEntry::from(rating)).await.unwrap();

    reconciler.reconcile(look.look_id).await.unwrap();
    let entries = cache.drain().await;
    assert_eq!(entries.len(), 1);
    assert!(entries[0].reconciled_at.is_some());
  }

  #[tokio::test]
  async fn reconciles_of_one_look_are_serialized() {
    let (store, cache, reconciler) = setup().await;
    let look = store.add_look().await.unwrap().look_id;
    let other = store.add_look().await.unwrap().look_id;
    let rating = store.upsert_rating(Uuid::new_v4(), look, score(4)).await.unwrap();
    cache.absorb(FallbackEntry::from(rating)).await.unwrap();

    let guard = reconciler.lock_look(look).await;
    let blocked =
      tokio::time::timeout(std::time::Duration::from_millis(100), reconciler.reconcile(look)).await;
    assert!(blocked.is_err());
    assert_eq!(store.get_look(look).await.unwrap().unwrap().stats.rating_count, 0);

    // Other looks are not held up.
    reconciler.reconcile(other).await.unwrap();

    drop(guard);
    let stats = reconciler.reconcile(look).await.unwrap();
    assert_eq!(stats.rating_count, 1);
  }

  #[tokio::test]
  async fn idle_look_locks_are_dropped() {
    let (store, _, reconciler) = setup().await;
    for _ in 0..5 {
      let look = store.add_look().await.unwrap().look_id;
      reconciler.reconcile(look).await.unwrap();
    }
    let _held = reconciler.lock_look(Uuid::new_v4()).await;
    assert_eq!(reconciler.locks.locks.lock().await.len(), 1);
  }
}
