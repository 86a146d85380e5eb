//! `looks`: command-line client for the looks vote server.
//!
//! # Usage
//!
//! ```
//! looks --url http://localhost:8080 --user alice --password secret rate <LOOK> 4
//! looks --config ~/.config/looks/config.toml stats
//! ```

mod client;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use looks_core::vote::Verdict;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEFAULT_URL: &str = "http://localhost:8080";

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "looks", about = "Command-line client for the looks vote server")]
struct Args {
  /// Path to a TOML config file (url, username, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the looks server (default: http://localhost:8080).
  #[arg(long, env = "LOOKS_URL")]
  url: Option<String>,

  /// API username.
  #[arg(long, env = "LOOKS_USER")]
  user: Option<String>,

  /// API password (plaintext).
  #[arg(long, env = "LOOKS_PASSWORD")]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Rate a look from 1 to 5.
  Rate { look_id: Uuid, score: i64 },
  /// Vote for one side of a battle.
  Battle { battle_id: Uuid, chosen_look_id: Uuid },
  /// Give a look a yay or a nay.
  YayNay {
    look_id: Uuid,
    #[arg(value_parser = parse_verdict)]
    verdict: Verdict,
  },
  /// Show a look's rating stats.
  LookStats { look_id: Uuid },
  /// Show a look's yay/nay tally.
  Tally { look_id: Uuid },
  /// Show a battle's tally and outcome.
  Standing { battle_id: Uuid },
  /// Store-wide rating stats (operator).
  Stats,
  /// Reconcile staged ratings into the stored aggregates (operator).
  Sync,
  /// Reinstall the aggregate refresh trigger (operator).
  RecreateTriggers,
}

fn parse_verdict(s: &str) -> Result<Verdict, looks_core::Error> { Verdict::parse(s) }

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
}

/// CLI flags (and their env vars) override the config file, which overrides
/// defaults.
fn resolve(
  url: Option<String>,
  user: Option<String>,
  password: Option<String>,
  file_cfg: &ConfigFile,
) -> ApiConfig {
  let from_file = |v: &String| (!v.is_empty()).then(|| v.clone());
  ApiConfig {
    base_url: url
      .or_else(|| from_file(&file_cfg.url))
      .unwrap_or_else(|| DEFAULT_URL.to_string()),
    username: user
      .or_else(|| from_file(&file_cfg.username))
      .unwrap_or_default(),
    password: password
      .or_else(|| from_file(&file_cfg.password))
      .unwrap_or_default(),
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  let client = ApiClient::new(resolve(args.url, args.user, args.password, &file_cfg))?;

  match args.command {
    Command::Rate { look_id, score } => print(&client.rate(look_id, score).await?),
    Command::Battle { battle_id, chosen_look_id } => {
      print(&client.vote_battle(battle_id, chosen_look_id).await?)
    }
    Command::YayNay { look_id, verdict } => {
      print(&client.vote_yay_nay(look_id, verdict).await?)
    }
    Command::LookStats { look_id } => print(&client.look_stats(look_id).await?),
    Command::Tally { look_id } => print(&client.yay_nay_tally(look_id).await?),
    Command::Standing { battle_id } => print(&client.battle(battle_id).await?),
    Command::Stats => print(&client.admin_stats().await?),
    Command::Sync => print(&client.sync_ratings().await?),
    Command::RecreateTriggers => print(&client.recreate_triggers().await?),
  }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value).context("formatting response")?);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn flags_override_file_which_overrides_defaults() {
    let file = ConfigFile {
      url:      "http://looks.internal".into(),
      username: "alice".into(),
      password: String::new(),
    };

    let cfg = resolve(None, Some("bob".into()), None, &file);
    assert_eq!(cfg.base_url, "http://looks.internal");
    assert_eq!(cfg.username, "bob");
    assert_eq!(cfg.password, "");

    let cfg = resolve(None, None, None, &ConfigFile::default());
    assert_eq!(cfg.base_url, DEFAULT_URL);
  }

  #[test]
  fn parses_subcommands() {
    let look = Uuid::new_v4();
    let args = Args::try_parse_from(["looks", "yay-nay", &look.to_string(), "nay"]).unwrap();
    assert!(matches!(
      args.command,
      Command::YayNay { look_id, verdict: Verdict::Nay } if look_id == look
    ));

    assert!(Args::try_parse_from(["looks", "yay-nay", &look.to_string(), "meh"]).is_err());
  }
}
