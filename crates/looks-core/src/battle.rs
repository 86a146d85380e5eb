//! Battles: pairwise contests between exactly two looks.
//!
//! Each voter holds at most one ballot per battle. Switching sides replaces the
//! ballot. The outcome is derived from the tally and the battle's lifecycle
//! state: an `active` battle never has a winner, a `completed` one has either a
//! winner or a tie.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BattleStatus {
  Active,
  Completed,
}

impl BattleStatus {
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownBattleStatus(s.to_owned()))
  }
}

/// A two-candidate contest. Candidates are fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Battle {
  pub battle_id:    Uuid,
  pub look_a:       Uuid,
  pub look_b:       Uuid,
  pub status:       BattleStatus,
  pub created_at:   DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
}

impl Battle {
  pub fn is_candidate(&self, look_id: Uuid) -> bool {
    look_id == self.look_a || look_id == self.look_b
  }

  /// Fails with [`Error::NotACandidate`] unless `look_id` is one of the two
  /// registered candidates.
  pub fn ensure_candidate(&self, look_id: Uuid) -> Result<()> {
    if self.is_candidate(look_id) {
      Ok(())
    } else {
      Err(Error::NotACandidate(look_id))
    }
  }

  /// Resolve the outcome for `tally` given this battle's current status.
  pub fn outcome(&self, tally: &BattleTally) -> BattleOutcome {
    match self.status {
      BattleStatus::Active => BattleOutcome::Pending,
      BattleStatus::Completed => match tally.votes_a.cmp(&tally.votes_b) {
        std::cmp::Ordering::Greater => BattleOutcome::Winner {
          look_id: tally.look_a,
        },
        std::cmp::Ordering::Less => BattleOutcome::Winner {
          look_id: tally.look_b,
        },
        std::cmp::Ordering::Equal => BattleOutcome::Tie,
      },
    }
  }
}

/// Check that a new battle's candidates are distinct.
pub fn validate_candidates(look_a: Uuid, look_b: Uuid) -> Result<()> {
  if look_a == look_b {
    return Err(Error::IdenticalCandidates(look_a));
  }
  Ok(())
}

/// One voter's current ballot in one battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleVote {
  pub voter_id:       Uuid,
  pub battle_id:      Uuid,
  pub chosen_look_id: Uuid,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

/// Current ballot counts per candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleTally {
  pub battle_id: Uuid,
  pub look_a:    Uuid,
  pub votes_a:   u64,
  pub look_b:    Uuid,
  pub votes_b:   u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum BattleOutcome {
  /// The battle is still active; no winner is reported.
  Pending,
  Winner { look_id: Uuid },
  Tie,
}
