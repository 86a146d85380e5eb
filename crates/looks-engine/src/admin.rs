//! Operator-only maintenance operations.

use std::sync::Arc;

use looks_core::{look::AdminStats, store::VoteStore};

use crate::{
  Result, VoteError,
  identity::Caller,
  reconcile::{Reconciler, SyncReport},
};

pub struct AdminService<S: VoteStore> {
  store:      Arc<S>,
  reconciler: Reconciler<S>,
}

impl<S: VoteStore> Clone for AdminService<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), reconciler: self.reconciler.clone() }
  }
}

impl<S: VoteStore> AdminService<S> {
  pub fn new(store: Arc<S>, reconciler: Reconciler<S>) -> Self { Self { store, reconciler } }

  /// Summary over the stored aggregates. Reads only; staged ratings that
  /// have not been reconciled yet are not counted.
  pub async fn get_stats(&self, caller: &Caller) -> Result<AdminStats> {
    caller.require_operator()?;
    self.store.admin_stats().await.map_err(VoteError::store)
  }

  pub async fn sync_ratings(&self, caller: &Caller) -> Result<SyncReport> {
    caller.require_operator()?;
    tracing::info!(operator = %caller.user_id, "rating sync requested");
    Ok(self.reconciler.reconcile_all().await)
  }

  /// Reinstall the aggregate refresh trigger. Vote data is untouched.
  pub async fn recreate_triggers(&self, caller: &Caller) -> Result<Vec<String>> {
    caller.require_operator()?;
    tracing::info!(operator = %caller.user_id, "trigger recreation requested");
    self.store.recreate_triggers().await.map_err(VoteError::store)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{cache::FallbackCache, identity::Role, voting::VotingService};
  use looks_store_sqlite::{REFRESH_TRIGGER, SqliteStore};
  use std::time::Duration;
  use uuid::Uuid;

  fn caller(role: Role) -> Caller { Caller { user_id: Uuid::new_v4(), role } }

  async fn setup() -> (Arc<SqliteStore>, VotingService<SqliteStore>, AdminService<SqliteStore>) {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let cache = Arc::new(FallbackCache::in_memory());
    let reconciler = Reconciler::new(store.clone(), cache.clone());
    let voting = VotingService::new(
      store.clone(),
      cache,
      reconciler.clone(),
      Duration::from_secs(5),
    );
    let admin = AdminService::new(store.clone(), reconciler);
    (store, voting, admin)
  }

  #[tokio::test]
  async fn voters_are_forbidden() {
    let (_, _, admin) = setup().await;
    let voter = caller(Role::Voter);

    assert!(matches!(admin.get_stats(&voter).await, Err(VoteError::Forbidden(_))));
    assert!(matches!(admin.sync_ratings(&voter).await, Err(VoteError::Forbidden(_))));
    assert!(matches!(
      admin.recreate_triggers(&voter).await,
      Err(VoteError::Forbidden(_))
    ));
  }

  #[tokio::test]
  async fn stats_reflect_stored_aggregates() {
    let (store, voting, admin) = setup().await;
    let l1 = store.add_look().await.unwrap().look_id;
    let _l2 = store.add_look().await.unwrap();
    for raw in [5, 4, 4] {
      voting.rate(Uuid::new_v4(), l1, raw).await.unwrap();
    }

    let stats = admin.get_stats(&caller(Role::Operator)).await.unwrap();
    assert_eq!(stats.total_looks, 2);
    assert_eq!(stats.rated_looks, 1);
    assert_eq!(stats.max_ratings_on_look, 3);
    assert_eq!(stats.top_rated_count, 1);
    assert_eq!(stats.avg_ratings_per_look, 1.5);
  }

  #[tokio::test]
  async fn sync_repairs_absorbed_ratings() {
    let (store, voting, admin) = setup().await;
    let look = store.add_look().await.unwrap().look_id;
    store.drop_triggers().await.unwrap();
    voting.rate(Uuid::new_v4(), look, 3).await.unwrap();

    let op = caller(Role::Operator);
    let report = admin.sync_ratings(&op).await.unwrap();
    assert_eq!(report.synced_count, 1);
    assert!(report.skipped.is_empty());

    let look = store.get_look(look).await.unwrap().unwrap();
    assert_eq!(look.stats.rating_count, 1);
    assert_eq!(look.stats.avg_rating, 3.0);

    let again = admin.sync_ratings(&op).await.unwrap();
    assert_eq!(again.synced_count, 1);
    let look = store.get_look(look.look_id).await.unwrap().unwrap();
    assert_eq!(look.stats.rating_count, 1);
  }

  #[tokio::test]
  async fn recreating_triggers_restores_the_authoritative_path() {
    let (store, voting, admin) = setup().await;
    let look = store.add_look().await.unwrap().look_id;
    store.drop_triggers().await.unwrap();

    let names = admin.recreate_triggers(&caller(Role::Operator)).await.unwrap();
    assert_eq!(names, vec![REFRESH_TRIGGER.to_string()]);

    let outcome = voting.rate(Uuid::new_v4(), look, 4).await.unwrap();
    assert!(outcome.stats.is_some());
  }
}
