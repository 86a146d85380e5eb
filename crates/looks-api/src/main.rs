//! looks server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store and the fallback cache snapshot, and serves the vote API over
//! HTTP. A background task reconciles staged ratings on an interval, and the
//! cache is snapshotted once more on shutdown.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for an account's `password_hash`:
//!
//! ```
//! cargo run -p looks-api --bin server -- --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use looks_api::{AppState, ServerConfig, auth::AuthConfig};
use looks_engine::{Engine, cache::FallbackCache};
use looks_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Looks vote server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("LOOKS"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  if server_cfg.accounts.is_empty() {
    tracing::warn!("no accounts configured; every request will be rejected");
  }

  let store_path    = expand_tilde(&server_cfg.store_path);
  let snapshot_path = expand_tilde(&server_cfg.snapshot_path);

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let cache = FallbackCache::open(&snapshot_path, server_cfg.snapshot_every)
    .await
    .with_context(|| format!("failed to read fallback snapshot at {snapshot_path:?}"))?;
  let cache = Arc::new(cache);

  let engine = Engine::new(Arc::new(store), cache.clone(), server_cfg.store_timeout());

  if let Some(every) = server_cfg.reconcile_interval() {
    let reconciler = engine.reconciler.clone();
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(every);
      // The first tick completes immediately; start with the first full period.
      ticker.tick().await;
      loop {
        ticker.tick().await;
        reconciler.reconcile_all().await;
      }
    });
  }

  let state = AppState {
    engine,
    auth: Arc::new(AuthConfig::new(server_cfg.accounts.clone())),
  };

  let app = looks_api::router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  cache
    .snapshot()
    .await
    .context("failed to write fallback snapshot on shutdown")?;
  tracing::info!(staged = cache.len().await, "fallback cache snapshotted; exiting");

  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutdown requested");
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
