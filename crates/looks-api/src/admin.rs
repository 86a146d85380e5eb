//! Handlers for `/admin/ratings`. Operator-only.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/admin/ratings` | aggregate stats |
//! | `POST` | `/admin/ratings` | body: `{"action":"sync_ratings"}` or `{"action":"recreate_triggers"}` |

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use looks_core::{look::AdminStats, store::VoteStore};
use looks_engine::reconcile::SkippedLook;
use serde::{Deserialize, Serialize};

use crate::{AppState, auth::Authenticated, error::ApiError};

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AdminAction {
  SyncRatings,
  RecreateTriggers,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ActionResult {
  Synced {
    success:      bool,
    synced_count: usize,
    skipped:      Vec<SkippedLook>,
  },
  Triggers {
    success:  bool,
    triggers: Vec<String>,
  },
}

/// `GET /admin/ratings`
pub async fn stats<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
) -> Result<Json<AdminStats>, ApiError>
where
  S: VoteStore + 'static,
{
  Ok(Json(state.engine.admin.get_stats(&caller).await?))
}

/// `POST /admin/ratings`
pub async fn action<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  payload: Result<Json<AdminAction>, JsonRejection>,
) -> Result<Json<ActionResult>, ApiError>
where
  S: VoteStore + 'static,
{
  // Role is checked before the body so non-operators always see 403.
  caller.require_operator()?;
  let Json(action) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

  let result = match action {
    AdminAction::SyncRatings => {
      let report = state.engine.admin.sync_ratings(&caller).await?;
      ActionResult::Synced {
        success:      true,
        synced_count: report.synced_count,
        skipped:      report.skipped,
      }
    }
    AdminAction::RecreateTriggers => {
      let triggers = state.engine.admin.recreate_triggers(&caller).await?;
      ActionResult::Triggers { success: true, triggers }
    }
  };
  Ok(Json(result))
}
