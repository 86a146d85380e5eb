//! Error types for `looks-engine`.

use looks_core::store::StoreFailure;
use thiserror::Error;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a vote, read or admin operation.
///
/// Only some variants reach voters: the ones meaning "your vote was not
/// recorded". [`VoteError::AggregateRefreshFailed`] is absorbed by the voting
/// service and only ever logged.
#[derive(Debug, Error)]
pub enum VoteError {
  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("look {look_id} is not a candidate in battle {battle_id}")]
  InvalidCandidate { look_id: Uuid, battle_id: Uuid },

  #[error("battle {0} is already completed")]
  BattleClosed(Uuid),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("store unavailable: {0}")]
  StoreUnavailable(#[source] BoxError),

  #[error("aggregate refresh failed for look {look_id}: {source}")]
  AggregateRefreshFailed {
    look_id: Uuid,
    #[source]
    source:  BoxError,
  },
}

impl VoteError {
  /// Classify a store error: missing references become
  /// [`VoteError::NotFound`], everything else [`VoteError::StoreUnavailable`].
  pub fn store<E: StoreFailure>(err: E) -> Self {
    if err.is_not_found() {
      VoteError::NotFound(err.to_string())
    } else {
      VoteError::StoreUnavailable(Box::new(err))
    }
  }
}

/// Failure reading or writing the fallback cache snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
  #[error("snapshot i/o error at {path}: {source}")]
  Io {
    path:   std::path::PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("snapshot json error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = VoteError> = std::result::Result<T, E>;
