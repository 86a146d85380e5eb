//! HTTP Basic-auth extractor resolving credentials to a [`Caller`].

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use looks_core::store::VoteStore;
use looks_engine::identity::{Caller, Role};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// One login accepted by this server instance.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  /// The voter identity this login votes as.
  pub user_id:       Uuid,
  #[serde(default)]
  pub role:          Role,
}

/// Credentials accepted as valid for this server instance.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
  pub accounts: Vec<Account>,
}

impl AuthConfig {
  pub fn new(accounts: Vec<Account>) -> Self { Self { accounts } }

  fn find(&self, username: &str) -> Option<&Account> {
    self.accounts.iter().find(|a| a.username == username)
  }
}

/// Present in a handler means the request was authenticated as `.0`.
pub struct Authenticated(pub Caller);

/// Verify Basic credentials from headers and resolve the caller.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<Caller, ApiError> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  let account = config.find(username).ok_or(ApiError::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&account.password_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(Caller { user_id: account.user_id, role: account.role })
}

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: VoteStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let caller = verify_auth(&parts.headers, &state.auth)?;
    Ok(Authenticated(caller))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::{HeaderValue, header};

  fn hash(password: &str) -> String {
    use argon2::{PasswordHasher, password_hash::SaltString};
    use rand_core::OsRng;
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string()
  }

  fn config() -> (AuthConfig, Uuid, Uuid) {
    let (alice, root) = (Uuid::new_v4(), Uuid::new_v4());
    let config = AuthConfig::new(vec![
      Account {
        username:      "alice".into(),
        password_hash: hash("secret"),
        user_id:       alice,
        role:          Role::Voter,
      },
      Account {
        username:      "root".into(),
        password_hash: hash("hunter2"),
        user_id:       root,
        role:          Role::Operator,
      },
    ]);
    (config, alice, root)
  }

  fn headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    headers
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  #[test]
  fn resolves_each_account_to_its_identity() {
    let (config, alice, root) = config();

    let caller = verify_auth(&headers(&basic("alice", "secret")), &config).unwrap();
    assert_eq!(caller, Caller { user_id: alice, role: Role::Voter });

    let caller = verify_auth(&headers(&basic("root", "hunter2")), &config).unwrap();
    assert_eq!(caller, Caller { user_id: root, role: Role::Operator });
  }

  #[test]
  fn wrong_password() {
    let (config, ..) = config();
    let res = verify_auth(&headers(&basic("alice", "hunter2")), &config);
    assert!(matches!(res, Err(ApiError::Unauthorized)));
  }

  #[test]
  fn unknown_user() {
    let (config, ..) = config();
    let res = verify_auth(&headers(&basic("mallory", "secret")), &config);
    assert!(matches!(res, Err(ApiError::Unauthorized)));
  }

  #[test]
  fn missing_header() {
    let (config, ..) = config();
    assert!(matches!(
      verify_auth(&HeaderMap::new(), &config),
      Err(ApiError::Unauthorized)
    ));
  }

  #[test]
  fn invalid_base64() {
    let (config, ..) = config();
    let res = verify_auth(&headers("Basic !!!not-base64!!!"), &config);
    assert!(matches!(res, Err(ApiError::Unauthorized)));
  }
}
