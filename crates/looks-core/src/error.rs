//! Error types for `looks-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("score must be between 1 and 5, got {0}")]
  ScoreOutOfRange(i64),

  #[error("unknown verdict: {0:?}")]
  UnknownVerdict(String),

  #[error("unknown battle status: {0:?}")]
  UnknownBattleStatus(String),

  #[error("look {0} is not a candidate in this battle")]
  NotACandidate(Uuid),

  #[error("a battle needs two distinct looks, got {0} twice")]
  IdenticalCandidates(Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
