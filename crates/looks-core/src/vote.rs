//! Scalar ratings and binary yay/nay votes.
//!
//! Both are keyed by `(voter, look)`: a second submission overwrites the first
//! rather than adding a new record.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Score ───────────────────────────────────────────────────────────────────

/// A rating score, guaranteed to be in `1..=5`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "u8")]
pub struct Score(u8);

impl Score {
  pub const MIN: u8 = 1;
  pub const MAX: u8 = 5;

  pub fn get(self) -> u8 { self.0 }
}

impl TryFrom<i64> for Score {
  type Error = Error;

  fn try_from(raw: i64) -> Result<Self> {
    if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&raw) {
      Ok(Self(raw as u8))
    } else {
      Err(Error::ScoreOutOfRange(raw))
    }
  }
}

impl From<Score> for u8 {
  fn from(score: Score) -> Self { score.0 }
}

// ─── Rating ──────────────────────────────────────────────────────────────────

/// One voter's current rating of one look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
  pub voter_id:   Uuid,
  pub look_id:    Uuid,
  pub score:      Score,
  /// Set on the first submission; never changes afterwards.
  pub created_at: DateTime<Utc>,
  /// Set by the store on every submission.
  pub updated_at: DateTime<Utc>,
}

// ─── Yay / nay ───────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Verdict {
  Yay,
  Nay,
}

impl Verdict {
  /// Parse the stored column value.
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownVerdict(s.to_owned()))
  }
}

/// One voter's current verdict on one look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YayNayVote {
  pub voter_id:   Uuid,
  pub look_id:    Uuid,
  pub verdict:    Verdict,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Yay and nay counts for a look, always computed from the stored votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YayNayTally {
  pub look_id: Uuid,
  pub yay:     u64,
  pub nay:     u64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn score_bounds() {
    assert!(Score::try_from(0).is_err());
    assert!(Score::try_from(6).is_err());
    assert!(Score::try_from(-3).is_err());
    assert_eq!(Score::try_from(1).unwrap().get(), 1);
    assert_eq!(Score::try_from(5).unwrap().get(), 5);
  }

  #[test]
  fn score_rejects_out_of_range_json() {
    assert!(serde_json::from_str::<Score>("7").is_err());
    assert_eq!(serde_json::from_str::<Score>("3").unwrap().get(), 3);
    assert_eq!(serde_json::to_string(&Score::try_from(4).unwrap()).unwrap(), "4");
  }

  #[test]
  fn verdict_strings() {
    assert_eq!(Verdict::Yay.as_ref(), "yay");
    assert_eq!(Verdict::parse("nay").unwrap(), Verdict::Nay);
    assert!(matches!(Verdict::parse("meh"), Err(Error::UnknownVerdict(_))));
    assert_eq!(
      serde_json::from_str::<Verdict>("\"yay\"").unwrap(),
      Verdict::Yay
    );
  }
}
