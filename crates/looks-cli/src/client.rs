//! Async HTTP client wrapping the looks JSON API.

use anyhow::{Context, Result, anyhow};
use looks_core::{
  look::{AdminStats, Look},
  vote::{Verdict, YayNayTally},
};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use uuid::Uuid;

/// Connection settings for the looks API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// Async HTTP client for the looks JSON API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
    tracing::debug!(path, "GET");
    let resp = self
      .auth(self.client.get(self.url(path)))
      .send()
      .await
      .with_context(|| format!("GET {path} failed"))?;
    decode(resp, "GET", path).await
  }

  async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
    tracing::debug!(path, "POST");
    let resp = self
      .auth(self.client.post(self.url(path)))
      .json(body)
      .send()
      .await
      .with_context(|| format!("POST {path} failed"))?;
    decode(resp, "POST", path).await
  }

  // ── Votes ─────────────────────────────────────────────────────────────────

  /// `POST /api/votes` with a rating.
  pub async fn rate(&self, look_id: Uuid, score: i64) -> Result<Value> {
    self
      .post(
        "/votes",
        &json!({ "vote_kind": "rating", "subject_id": look_id, "score": score }),
      )
      .await
  }

  /// `POST /api/votes` with a battle ballot.
  pub async fn vote_battle(&self, battle_id: Uuid, chosen: Uuid) -> Result<Value> {
    self
      .post(
        "/votes",
        &json!({ "vote_kind": "battle", "battle_id": battle_id, "chosen_subject_id": chosen }),
      )
      .await
  }

  /// `POST /api/votes` with a yay/nay verdict.
  pub async fn vote_yay_nay(&self, look_id: Uuid, verdict: Verdict) -> Result<Value> {
    self
      .post(
        "/votes",
        &json!({ "vote_kind": "yay_nay", "subject_id": look_id, "verdict": verdict }),
      )
      .await
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// `GET /api/looks/{id}/stats`
  pub async fn look_stats(&self, look_id: Uuid) -> Result<Look> {
    self.get(&format!("/looks/{look_id}/stats")).await
  }

  /// `GET /api/looks/{id}/yay-nay`
  pub async fn yay_nay_tally(&self, look_id: Uuid) -> Result<YayNayTally> {
    self.get(&format!("/looks/{look_id}/yay-nay")).await
  }

  /// `GET /api/battles/{id}`
  pub async fn battle(&self, battle_id: Uuid) -> Result<Value> {
    self.get(&format!("/battles/{battle_id}")).await
  }

  // ── Admin ─────────────────────────────────────────────────────────────────

  /// `GET /api/admin/ratings`
  pub async fn admin_stats(&self) -> Result<AdminStats> { self.get("/admin/ratings").await }

  /// `POST /api/admin/ratings` with `sync_ratings`
  pub async fn sync_ratings(&self) -> Result<Value> {
    self
      .post("/admin/ratings", &json!({ "action": "sync_ratings" }))
      .await
  }

  /// `POST /api/admin/ratings` with `recreate_triggers`
  pub async fn recreate_triggers(&self) -> Result<Value> {
    self
      .post("/admin/ratings", &json!({ "action": "recreate_triggers" }))
      .await
  }
}

/// Deserialize a success body, or turn the server's `{"error": …}` body into
/// an error.
async fn decode<T: DeserializeOwned>(resp: Response, method: &str, path: &str) -> Result<T> {
  let status = resp.status();
  if !status.is_success() {
    let message = resp
      .json::<Value>()
      .await
      .ok()
      .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_owned))
      .unwrap_or_else(|| status.to_string());
    return Err(anyhow!("{method} {path} → {status}: {message}"));
  }
  resp
    .json()
    .await
    .with_context(|| format!("deserialising {method} {path} response"))
}
