use std::sync::Arc;

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use looks_engine::{cache::FallbackCache, identity::Role};
use looks_store_sqlite::{REFRESH_TRIGGER, SqliteStore};
use rand_core::OsRng;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use super::*;

struct Harness {
  state: AppState<SqliteStore>,
  store: Arc<SqliteStore>,
  voter: Uuid,
}

fn hash(password: &str) -> String {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .unwrap()
    .to_string()
}

async fn harness() -> Harness {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let cache = Arc::new(FallbackCache::in_memory());
  let voter = Uuid::new_v4();

  let accounts = vec![
    Account {
      username:      "alice".to_string(),
      password_hash: hash("secret"),
      user_id:       voter,
      role:          Role::Voter,
    },
    Account {
      username:      "root".to_string(),
      password_hash: hash("hunter2"),
      user_id:       Uuid::new_v4(),
      role:          Role::Operator,
    },
  ];

  let config = ServerConfig {
    host:                    "127.0.0.1".to_string(),
    port:                    8080,
    store_path:              PathBuf::from(":memory:"),
    snapshot_path:           PathBuf::from("fallback.json"),
    snapshot_every:          DEFAULT_SNAPSHOT_EVERY,
    store_timeout_ms:        5_000,
    reconcile_interval_secs: 0,
    accounts,
  };

  let state = AppState {
    engine: Engine::new(store.clone(), cache, config.store_timeout()),
    auth:   Arc::new(AuthConfig::new(config.accounts)),
  };
  Harness { state, store, voter }
}

fn voter_auth() -> String { format!("Basic {}", B64.encode("alice:secret")) }
fn operator_auth() -> String { format!("Basic {}", B64.encode("root:hunter2")) }

async fn send(
  h: &Harness,
  method: &str,
  uri: &str,
  auth: Option<String>,
  body: Option<String>,
) -> Response {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(auth) = auth {
    builder = builder.header(header::AUTHORIZATION, auth);
  }
  let body = match body {
    Some(body) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(body)
    }
    None => Body::empty(),
  };
  router(h.state.clone()).oneshot(builder.body(body).unwrap()).await.unwrap()
}

async fn vote(h: &Harness, body: Value) -> Response {
  send(h, "POST", "/api/votes", Some(voter_auth()), Some(body.to_string())).await
}

async fn json_body(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

// ── Auth ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_credentials_return_401_with_challenge() {
  let h = harness().await;
  let resp = send(&h, "GET", "/api/admin/ratings", None, None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
  assert_eq!(json_body(resp).await["error"], "unauthorized");
}

#[tokio::test]
async fn voting_as_someone_else_is_forbidden() {
  let h = harness().await;
  let look = h.store.add_look().await.unwrap().look_id;
  let resp = vote(
    &h,
    json!({
      "vote_kind": "rating",
      "subject_id": look,
      "score": 4,
      "voter_id": Uuid::new_v4(),
    }),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

// ── Ratings ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rating_returns_record_and_stats() {
  let h = harness().await;
  let look = h.store.add_look().await.unwrap().look_id;

  let resp = vote(
    &h,
    json!({ "vote_kind": "rating", "subject_id": look, "score": 4, "voter_id": h.voter }),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);

  let body = json_body(resp).await;
  assert_eq!(body["success"], true);
  assert_eq!(body["record"]["score"], 4);
  assert_eq!(body["record"]["voter_id"], h.voter.to_string());
  assert_eq!(body["stats"]["rating_count"], 1);
  assert_eq!(body["stats"]["avg_rating"], 4.0);
}

#[tokio::test]
async fn revote_answers_like_a_first_vote() {
  let h = harness().await;
  let look = h.store.add_look().await.unwrap().look_id;

  for score in [4, 2] {
    let resp =
      vote(&h, json!({ "vote_kind": "rating", "subject_id": look, "score": score })).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  let resp = send(&h, "GET", &format!("/api/looks/{look}/stats"), Some(voter_auth()), None).await;
  let body = json_body(resp).await;
  assert_eq!(body["rating_count"], 1);
  assert_eq!(body["avg_rating"], 2.0);
}

#[tokio::test]
async fn out_of_range_score_is_400() {
  let h = harness().await;
  let look = h.store.add_look().await.unwrap().look_id;
  let resp = vote(&h, json!({ "vote_kind": "rating", "subject_id": look, "score": 6 })).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert!(json_body(resp).await["error"].is_string());
}

#[tokio::test]
async fn malformed_body_is_400() {
  let h = harness().await;
  let resp = send(
    &h,
    "POST",
    "/api/votes",
    Some(voter_auth()),
    Some("{\"vote_kind\": \"rating\", ".to_string()),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let resp = vote(&h, json!({ "vote_kind": "curtsy", "subject_id": Uuid::new_v4() })).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rating_unknown_look_is_404() {
  let h = harness().await;
  let resp =
    vote(&h, json!({ "vote_kind": "rating", "subject_id": Uuid::new_v4(), "score": 3 })).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rating_is_accepted_when_the_refresh_fails() {
  let h = harness().await;
  let look = h.store.add_look().await.unwrap().look_id;
  h.store.drop_triggers().await.unwrap();

  let resp = vote(&h, json!({ "vote_kind": "rating", "subject_id": look, "score": 5 })).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = json_body(resp).await;
  assert_eq!(body["success"], true);
  assert!(body.get("stats").is_none());
}

// ── Battles ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn battle_vote_reports_standing() {
  let h = harness().await;
  let a = h.store.add_look().await.unwrap().look_id;
  let b = h.store.add_look().await.unwrap().look_id;
  let battle = h.store.create_battle(a, b).await.unwrap().battle_id;

  let resp = vote(
    &h,
    json!({ "vote_kind": "battle", "battle_id": battle, "chosen_subject_id": b }),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = json_body(resp).await;
  assert_eq!(body["record"]["chosen_look_id"], b.to_string());
  assert_eq!(body["stats"]["tally"]["votes_b"], 1);
  assert_eq!(body["stats"]["outcome"]["result"], "pending");

  h.store.complete_battle(battle).await.unwrap();
  let resp = send(&h, "GET", &format!("/api/battles/{battle}"), Some(voter_auth()), None).await;
  let body = json_body(resp).await;
  assert_eq!(body["outcome"]["result"], "winner");
  assert_eq!(body["outcome"]["look_id"], b.to_string());
}

#[tokio::test]
async fn battle_conflicts_are_409() {
  let h = harness().await;
  let a = h.store.add_look().await.unwrap().look_id;
  let b = h.store.add_look().await.unwrap().look_id;
  let outsider = h.store.add_look().await.unwrap().look_id;
  let battle = h.store.create_battle(a, b).await.unwrap().battle_id;

  let resp = vote(
    &h,
    json!({ "vote_kind": "battle", "battle_id": battle, "chosen_subject_id": outsider }),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);

  h.store.complete_battle(battle).await.unwrap();
  let resp = vote(
    &h,
    json!({ "vote_kind": "battle", "battle_id": battle, "chosen_subject_id": a }),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);
}

// ── Yay / nay ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn yay_nay_vote_reports_tally() {
  let h = harness().await;
  let look = h.store.add_look().await.unwrap().look_id;

  let resp =
    vote(&h, json!({ "vote_kind": "yay_nay", "subject_id": look, "verdict": "yay" })).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = json_body(resp).await;
  assert_eq!(body["record"]["verdict"], "yay");
  assert_eq!(body["stats"]["yay"], 1);

  let resp =
    send(&h, "GET", &format!("/api/looks/{look}/yay-nay"), Some(voter_auth()), None).await;
  let body = json_body(resp).await;
  assert_eq!((body["yay"].as_u64(), body["nay"].as_u64()), (Some(1), Some(0)));
}

// ── Admin ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_routes_reject_voters() {
  let h = harness().await;
  let resp = send(&h, "GET", "/api/admin/ratings", Some(voter_auth()), None).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);

  let resp = send(
    &h,
    "POST",
    "/api/admin/ratings",
    Some(voter_auth()),
    Some(json!({ "action": "sync_ratings" }).to_string()),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_stats_for_operator() {
  let h = harness().await;
  let look = h.store.add_look().await.unwrap().look_id;
  h.store.add_look().await.unwrap();
  vote(&h, json!({ "vote_kind": "rating", "subject_id": look, "score": 3 })).await;

  let resp = send(&h, "GET", "/api/admin/ratings", Some(operator_auth()), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = json_body(resp).await;
  assert_eq!(body["total_looks"], 2);
  assert_eq!(body["rated_looks"], 1);
  assert_eq!(body["avg_ratings_per_look"], 0.5);
  assert_eq!(body["max_ratings_on_look"], 1);
  assert_eq!(body["top_rated_count"], 0);
}

#[tokio::test]
async fn sync_and_recreate_repair_the_aggregates() {
  let h = harness().await;
  let look = h.store.add_look().await.unwrap().look_id;
  h.store.drop_triggers().await.unwrap();
  vote(&h, json!({ "vote_kind": "rating", "subject_id": look, "score": 5 })).await;

  let resp = send(
    &h,
    "POST",
    "/api/admin/ratings",
    Some(operator_auth()),
    Some(json!({ "action": "sync_ratings" }).to_string()),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = json_body(resp).await;
  assert_eq!(body["success"], true);
  assert_eq!(body["synced_count"], 1);

  let resp = send(&h, "GET", &format!("/api/looks/{look}/stats"), Some(voter_auth()), None).await;
  assert_eq!(json_body(resp).await["rating_count"], 1);

  let resp = send(
    &h,
    "POST",
    "/api/admin/ratings",
    Some(operator_auth()),
    Some(json!({ "action": "recreate_triggers" }).to_string()),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = json_body(resp).await;
  assert_eq!(body["success"], true);
  assert_eq!(body["triggers"], json!([REFRESH_TRIGGER]));
}

#[tokio::test]
async fn unknown_admin_action_is_400() {
  let h = harness().await;
  let resp = send(
    &h,
    "POST",
    "/api/admin/ratings",
    Some(operator_auth()),
    Some(json!({ "action": "drop_everything" }).to_string()),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
