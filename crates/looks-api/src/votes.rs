//! Handler for `POST /votes`.
//!
//! The body is tagged by `vote_kind`:
//!
//! ```json
//! {"vote_kind":"rating",  "subject_id":"…", "score":4}
//! {"vote_kind":"battle",  "battle_id":"…", "chosen_subject_id":"…"}
//! {"vote_kind":"yay_nay", "subject_id":"…", "verdict":"yay"}
//! ```
//!
//! An optional `voter_id` must match the authenticated caller. Re-voting
//! overwrites and answers exactly like a first vote.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  response::{IntoResponse, Response},
};
use looks_core::{store::VoteStore, vote::Verdict};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

#[derive(Debug, Deserialize)]
#[serde(tag = "vote_kind", rename_all = "snake_case")]
pub enum VoteKind {
  Rating { subject_id: Uuid, score: i64 },
  Battle { battle_id: Uuid, chosen_subject_id: Uuid },
  YayNay { subject_id: Uuid, verdict: Verdict },
}

#[derive(Debug, Deserialize)]
pub struct SubmitVote {
  #[serde(default)]
  pub voter_id: Option<Uuid>,
  #[serde(flatten)]
  pub kind:     VoteKind,
}

#[derive(Debug, Serialize)]
pub struct VoteAccepted<R, T> {
  pub success: bool,
  pub record:  R,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub stats:   Option<T>,
}

impl<R: Serialize, T: Serialize> VoteAccepted<R, T> {
  fn new(record: R, stats: Option<T>) -> Self { Self { success: true, record, stats } }
}

/// `POST /votes`
pub async fn submit<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  payload: Result<Json<SubmitVote>, JsonRejection>,
) -> Result<Response, ApiError>
where
  S: VoteStore + 'static,
{
  let Json(body) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
  let voter_id = caller.ensure_voter(body.voter_id)?;
  let voting = &state.engine.voting;

  let response = match body.kind {
    VoteKind::Rating { subject_id, score } => {
      let outcome = voting.rate(voter_id, subject_id, score).await?;
      Json(VoteAccepted::new(outcome.record, outcome.stats)).into_response()
    }
    VoteKind::Battle { battle_id, chosen_subject_id } => {
      let ballot = voting.vote_battle(voter_id, battle_id, chosen_subject_id).await?;
      Json(VoteAccepted::new(ballot.record, ballot.standing)).into_response()
    }
    VoteKind::YayNay { subject_id, verdict } => {
      let ballot = voting.vote_yay_nay(voter_id, subject_id, verdict).await?;
      Json(VoteAccepted::new(ballot.record, ballot.tally)).into_response()
    }
  };
  Ok(response)
}
