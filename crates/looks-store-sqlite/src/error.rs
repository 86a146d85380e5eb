//! Error type for `looks-store-sqlite`.

use looks_core::store::StoreFailure;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] looks_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("stored value out of range: {0}")]
  Decode(String),

  #[error("look not found: {0}")]
  LookNotFound(uuid::Uuid),

  #[error("battle not found: {0}")]
  BattleNotFound(uuid::Uuid),

  /// The aggregate-refresh trigger is not installed.
  #[error("aggregate refresh trigger {0:?} is not installed")]
  RefreshTriggerMissing(&'static str),
}

impl StoreFailure for Error {
  fn is_not_found(&self) -> bool {
    matches!(self, Error::LookNotFound(_) | Error::BattleNotFound(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
