//! Handlers for `/looks` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/looks/{id}/stats`   | denormalized stats; 404 if not found |
//! | `GET`  | `/looks/{id}/yay-nay` | tally computed on read |

use axum::{
  Json,
  extract::{Path, State},
};
use looks_core::{look::Look, store::VoteStore, vote::YayNayTally};
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

/// `GET /looks/{id}/stats`
pub async fn stats<S>(
  State(state): State<AppState<S>>,
  _: Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<Look>, ApiError>
where
  S: VoteStore + 'static,
{
  Ok(Json(state.engine.voting.look_stats(id).await?))
}

/// `GET /looks/{id}/yay-nay`
pub async fn yay_nay<S>(
  State(state): State<AppState<S>>,
  _: Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<YayNayTally>, ApiError>
where
  S: VoteStore + 'static,
{
  Ok(Json(state.engine.voting.yay_nay_tally(id).await?))
}
