//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use looks_engine::VoteError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Vote(#[from] VoteError),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Vote(e) => match e {
        VoteError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        VoteError::Forbidden(_) => StatusCode::FORBIDDEN,
        VoteError::NotFound(_) => StatusCode::NOT_FOUND,
        VoteError::InvalidCandidate { .. } | VoteError::BattleClosed(_) => {
          StatusCode::CONFLICT
        }
        VoteError::StoreUnavailable(_) | VoteError::AggregateRefreshFailed { .. } => {
          StatusCode::INTERNAL_SERVER_ERROR
        }
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }

    let mut res = (status, Json(json!({ "error": self.to_string() }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"looks\""),
      );
    }
    res
  }
}
