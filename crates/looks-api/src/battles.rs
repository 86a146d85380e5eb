//! Handler for `GET /battles/{id}`.

use axum::{
  Json,
  extract::{Path, State},
};
use looks_core::store::VoteStore;
use looks_engine::voting::BattleStanding;
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

/// `GET /battles/{id}`: the battle, its tally and its outcome.
pub async fn standing<S>(
  State(state): State<AppState<S>>,
  _: Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<BattleStanding>, ApiError>
where
  S: VoteStore + 'static,
{
  Ok(Json(state.engine.voting.battle_standing(id).await?))
}
