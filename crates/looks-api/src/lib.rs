//! JSON HTTP surface for the looks vote engine.
//!
//! Exposes an axum [`Router`] backed by a [`looks_engine::Engine`] over any
//! [`VoteStore`]. Every route requires HTTP Basic credentials; the admin
//! routes additionally require an operator account.

pub mod admin;
pub mod auth;
pub mod battles;
pub mod error;
pub mod looks;
pub mod votes;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{get, post},
};
use looks_core::store::VoteStore;
use looks_engine::{Engine, cache::DEFAULT_SNAPSHOT_EVERY};
use serde::Deserialize;

use auth::{Account, AuthConfig};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `LOOKS_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                    String,
  pub port:                    u16,
  pub store_path:              PathBuf,
  pub snapshot_path:           PathBuf,
  #[serde(default = "default_snapshot_every")]
  pub snapshot_every:          u64,
  #[serde(default = "default_store_timeout_ms")]
  pub store_timeout_ms:        u64,
  /// Seconds between background reconciliation passes; 0 disables them.
  #[serde(default = "default_reconcile_interval_secs")]
  pub reconcile_interval_secs: u64,
  #[serde(default)]
  pub accounts:                Vec<Account>,
}

fn default_snapshot_every() -> u64 { DEFAULT_SNAPSHOT_EVERY }
fn default_store_timeout_ms() -> u64 { 5_000 }
fn default_reconcile_interval_secs() -> u64 { 300 }

impl ServerConfig {
  pub fn store_timeout(&self) -> Duration { Duration::from_millis(self.store_timeout_ms) }

  pub fn reconcile_interval(&self) -> Option<Duration> {
    (self.reconcile_interval_secs > 0)
      .then(|| Duration::from_secs(self.reconcile_interval_secs))
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S: VoteStore> {
  pub engine: Engine<S>,
  pub auth:   Arc<AuthConfig>,
}

impl<S: VoteStore> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      engine: self.engine.clone(),
      auth:   self.auth.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router. Routes are mounted under `/api`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: VoteStore + 'static,
{
  Router::new()
    .route("/api/votes",             post(votes::submit::<S>))
    .route("/api/looks/{id}/stats",   get(looks::stats::<S>))
    .route("/api/looks/{id}/yay-nay", get(looks::yay_nay::<S>))
    .route("/api/battles/{id}",       get(battles::standing::<S>))
    .route("/api/admin/ratings",      get(admin::stats::<S>).post(admin::action::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
