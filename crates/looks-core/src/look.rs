//! Looks (the subjects people rate and vote on) and their aggregate
//! statistics.
//!
//! A look's identity is owned by collaborators (upload and delete flows). This
//! engine only ever touches the denormalized rating fields, and every average
//! it produces goes through [`round_half_up_hundredths`] so the in-process
//! path and the store's own refresh path agree exactly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::vote::Score;

/// A look needs at least this many ratings before it can be `top_rated`.
pub const TOP_RATED_MIN_RATINGS: u32 = 3;

/// Minimum average, in hundredths, for a look to be `top_rated` (4.00).
pub const TOP_RATED_MIN_AVG_HUNDREDTHS: u64 = 400;

// ─── Arithmetic ──────────────────────────────────────────────────────────────

/// `numerator / denominator` expressed in hundredths, rounded half-up.
///
/// Returns 0 when `denominator` is 0.
pub fn round_half_up_hundredths(numerator: u64, denominator: u64) -> u64 {
  if denominator == 0 {
    return 0;
  }
  (200 * numerator + denominator) / (2 * denominator)
}

fn hundredths_to_f64(hundredths: u64) -> f64 { hundredths as f64 / 100.0 }

// ─── LookStats ───────────────────────────────────────────────────────────────

/// The denormalized rating fields stored on a look.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LookStats {
  pub rating_count: u32,
  pub rating_sum:   u32,
  /// Rounded to two decimal places, half-up.
  pub avg_rating:   f64,
  pub top_rated:    bool,
}

impl LookStats {
  /// Build stats from a count and a sum of scores.
  pub fn from_totals(rating_count: u32, rating_sum: u32) -> Self {
    let hundredths =
      round_half_up_hundredths(u64::from(rating_sum), u64::from(rating_count));
    Self {
      rating_count,
      rating_sum,
      avg_rating: hundredths_to_f64(hundredths),
      top_rated: rating_count >= TOP_RATED_MIN_RATINGS
        && hundredths >= TOP_RATED_MIN_AVG_HUNDREDTHS,
    }
  }

  /// Build stats from one score per distinct voter.
  pub fn from_scores<I>(scores: I) -> Self
  where
    I: IntoIterator<Item = Score>,
  {
    let (count, sum) = scores
      .into_iter()
      .fold((0u32, 0u32), |(c, s), score| (c + 1, s + u32::from(score.get())));
    Self::from_totals(count, sum)
  }
}

// ─── Look ────────────────────────────────────────────────────────────────────

/// A ratable subject together with its current denormalized stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Look {
  pub look_id:    Uuid,
  pub created_at: DateTime<Utc>,
  #[serde(flatten)]
  pub stats:      LookStats,
}

// ─── AdminStats ──────────────────────────────────────────────────────────────

/// Store-wide summary returned by the operator stats query.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AdminStats {
  pub total_looks:          u64,
  /// Looks with at least one rating.
  pub rated_looks:          u64,
  /// Total ratings divided by total looks, two decimal places.
  pub avg_ratings_per_look: f64,
  pub max_ratings_on_look:  u32,
  pub top_rated_count:      u64,
}

impl AdminStats {
  pub fn from_counts(
    total_looks: u64,
    rated_looks: u64,
    total_ratings: u64,
    max_ratings_on_look: u32,
    top_rated_count: u64,
  ) -> Self {
    Self {
      total_looks,
      rated_looks,
      avg_ratings_per_look: hundredths_to_f64(round_half_up_hundredths(
        total_ratings,
        total_looks,
      )),
      max_ratings_on_look,
      top_rated_count,
    }
  }
}
