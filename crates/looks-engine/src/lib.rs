//! Vote orchestration for the looks store.
//!
//! Sits between the HTTP surface and an authoritative [`VoteStore`]:
//!
//! - [`voting::VotingService`] accepts ratings, battle ballots and yay/nay
//!   votes. A rating whose aggregate refresh fails is still accepted and is
//!   staged in the [`cache::FallbackCache`].
//! - [`reconcile::Reconciler`] folds staged ratings back into each look's
//!   denormalized stats.
//! - [`admin::AdminService`] exposes stats, resync and trigger repair to
//!   operators.

pub mod admin;
pub mod cache;
pub mod error;
pub mod identity;
pub mod reconcile;
pub mod voting;

use std::{sync::Arc, time::Duration};

use looks_core::store::VoteStore;

use crate::cache::FallbackCache;

pub use error::{Result, SnapshotError, VoteError};

/// Every service wired to one store and one fallback cache.
pub struct Engine<S: VoteStore> {
  pub cache:      Arc<FallbackCache>,
  pub reconciler: reconcile::Reconciler<S>,
  pub voting:     voting::VotingService<S>,
  pub admin:      admin::AdminService<S>,
}

impl<S: VoteStore> Engine<S> {
  pub fn new(store: Arc<S>, cache: Arc<FallbackCache>, store_timeout: Duration) -> Self {
    let reconciler = reconcile::Reconciler::new(store.clone(), cache.clone());
    Self {
      voting: voting::VotingService::new(
        store.clone(),
        cache.clone(),
        reconciler.clone(),
        store_timeout,
      ),
      admin: admin::AdminService::new(store, reconciler.clone()),
      reconciler,
      cache,
    }
  }
}

impl<S: VoteStore> Clone for Engine<S> {
  fn clone(&self) -> Self {
    Self {
      cache:      self.cache.clone(),
      reconciler: self.reconciler.clone(),
      voting:     self.voting.clone(),
      admin:      self.admin.clone(),
    }
  }
}
