//! The `VoteStore` trait over the authoritative record store.
//!
//! The trait is implemented by storage backends (e.g. `looks-store-sqlite`).
//! Higher layers (`looks-engine`, `looks-api`) depend on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  battle::{Battle, BattleTally, BattleVote},
  look::{AdminStats, Look, LookStats},
  vote::{Rating, Score, Verdict, YayNayTally, YayNayVote},
};

/// Classification every backend error must expose so callers can tell "the
/// thing you referenced is gone" apart from "the store could not do it".
pub trait StoreFailure: std::error::Error + Send + Sync + 'static {
  /// The referenced look or battle does not exist.
  fn is_not_found(&self) -> bool;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an authoritative vote store backend.
///
/// Every vote write is a keyed upsert: `(voter, look)` for ratings and yay/nay
/// votes, `(voter, battle)` for battle ballots. Concurrent upserts for the
/// same key are serialised by the store and the later arrival wins.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait VoteStore: Send + Sync {
  type Error: StoreFailure;

  // ── Looks ─────────────────────────────────────────────────────────────

  /// Register a new look with zeroed stats.
  fn add_look(&self) -> impl Future<Output = Result<Look, Self::Error>> + Send + '_;

  /// Register a look under a caller-supplied UUID.
  fn add_look_with_id(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Look, Self::Error>> + Send + '_;

  /// Retrieve a look and its denormalized stats. Returns `None` if not found.
  fn get_look(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Look>, Self::Error>> + Send + '_;

  fn list_looks(&self) -> impl Future<Output = Result<Vec<Look>, Self::Error>> + Send + '_;

  /// Remove a look along with its ratings, yay/nay votes and battles.
  fn delete_look(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Ratings ───────────────────────────────────────────────────────────

  /// Insert or replace the rating for `(voter_id, look_id)`.
  ///
  /// Does not touch the look's aggregate fields; see
  /// [`VoteStore::refresh_rating_aggregate`].
  fn upsert_rating(
    &self,
    voter_id: Uuid,
    look_id: Uuid,
    score: Score,
  ) -> impl Future<Output = Result<Rating, Self::Error>> + Send + '_;

  fn get_rating(
    &self,
    voter_id: Uuid,
    look_id: Uuid,
  ) -> impl Future<Output = Result<Option<Rating>, Self::Error>> + Send + '_;

  /// All current ratings for a look, one per voter.
  fn list_ratings(
    &self,
    look_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Rating>, Self::Error>> + Send + '_;

  // ── Aggregates ────────────────────────────────────────────────────────

  /// Run the store's derived-update mechanism for one look and return the
  /// refreshed stats. May fail independently of any preceding upsert.
  fn refresh_rating_aggregate(
    &self,
    look_id: Uuid,
  ) -> impl Future<Output = Result<LookStats, Self::Error>> + Send + '_;

  /// Overwrite a look's denormalized stats with externally computed values.
  fn write_look_stats(
    &self,
    look_id: Uuid,
    stats: LookStats,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Reinstall the derived-update mechanism. Safe to call when it is already
  /// installed; never touches vote data. Returns the names installed.
  fn recreate_triggers(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// Remove the derived-update mechanism.
  fn drop_triggers(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn admin_stats(&self) -> impl Future<Output = Result<AdminStats, Self::Error>> + Send + '_;

  // ── Battles ───────────────────────────────────────────────────────────

  /// Create an `active` battle between two distinct existing looks.
  fn create_battle(
    &self,
    look_a: Uuid,
    look_b: Uuid,
  ) -> impl Future<Output = Result<Battle, Self::Error>> + Send + '_;

  fn get_battle(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Battle>, Self::Error>> + Send + '_;

  /// Mark a battle `completed`. Completing an already completed battle keeps
  /// its original completion time.
  fn complete_battle(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Battle, Self::Error>> + Send + '_;

  /// Insert or replace the ballot for `(voter_id, battle_id)`. Candidate
  /// validation is the caller's job.
  fn upsert_battle_vote(
    &self,
    voter_id: Uuid,
    battle_id: Uuid,
    chosen_look_id: Uuid,
  ) -> impl Future<Output = Result<BattleVote, Self::Error>> + Send + '_;

  fn battle_tally(
    &self,
    battle_id: Uuid,
  ) -> impl Future<Output = Result<BattleTally, Self::Error>> + Send + '_;

  // ── Yay / nay ─────────────────────────────────────────────────────────

  fn upsert_yay_nay(
    &self,
    voter_id: Uuid,
    look_id: Uuid,
    verdict: Verdict,
  ) -> impl Future<Output = Result<YayNayVote, Self::Error>> + Send + '_;

  fn yay_nay_tally(
    &self,
    look_id: Uuid,
  ) -> impl Future<Output = Result<YayNayTally, Self::Error>> + Send + '_;
}
