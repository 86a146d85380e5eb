//! The fallback write cache.
//!
//! Holds ratings whose aggregate refresh failed after the authoritative upsert
//! succeeded. Entries are keyed `voter:look`, never expire, and are retained
//! after reconciliation with a `reconciled_at` audit stamp.
//!
//! The full contents are serialised to a JSON snapshot every
//! `snapshot_every` absorbed records and on shutdown, and the cache is seeded
//! from that snapshot on startup. A crash loses at most `snapshot_every - 1`
//! absorbed records.

use std::{
  collections::{BTreeMap, BTreeSet},
  io::ErrorKind,
  path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use looks_core::vote::{Rating, Score};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::SnapshotError;

/// Snapshot after this many absorbed records unless configured otherwise.
pub const DEFAULT_SNAPSHOT_EVERY: u64 = 10;

// ─── Entry ───────────────────────────────────────────────────────────────────

/// A staged rating. Same fields as a [`Rating`], plus the audit stamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackEntry {
  pub voter_id:      Uuid,
  pub look_id:       Uuid,
  pub score:         Score,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
  /// When a reconciliation pass last folded this entry into the look's stats.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reconciled_at: Option<DateTime<Utc>>,
}

impl FallbackEntry {
  pub fn key(&self) -> String { entry_key(self.voter_id, self.look_id) }
}

impl From<Rating> for FallbackEntry {
  fn from(r: Rating) -> Self {
    Self {
      voter_id:      r.voter_id,
      look_id:       r.look_id,
      score:         r.score,
      created_at:    r.created_at,
      updated_at:    r.updated_at,
      reconciled_at: None,
    }
  }
}

pub fn entry_key(voter_id: Uuid, look_id: Uuid) -> String { format!("{voter_id}:{look_id}") }

// ─── Cache ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct CacheState {
  entries:  BTreeMap<String, FallbackEntry>,
  /// Records absorbed since this process started; drives the snapshot cadence.
  absorbed: u64,
}

/// Process-wide staging area for ratings awaiting reconciliation.
///
/// All operations on the entries are serialised by one lock. Snapshot writes
/// are serialised by a second lock so they never interleave on disk.
pub struct FallbackCache {
  state:          Mutex<CacheState>,
  writer:         Mutex<()>,
  snapshot_path:  Option<PathBuf>,
  snapshot_every: u64,
}

impl FallbackCache {
  /// A cache with no durable snapshot.
  pub fn in_memory() -> Self {
    Self {
      state:          Mutex::new(CacheState::default()),
      writer:         Mutex::new(()),
      snapshot_path:  None,
      snapshot_every: DEFAULT_SNAPSHOT_EVERY,
    }
  }

  /// Open a cache backed by the snapshot at `path`, seeding it from the most
  /// recent snapshot if one exists.
  pub async fn open(
    path: impl Into<PathBuf>,
    snapshot_every: u64,
  ) -> Result<Self, SnapshotError> {
    let path = path.into();
    let entries = read_snapshot(&path).await?;
    tracing::info!(
      path = %path.display(),
      recovered = entries.len(),
      "seeded fallback cache from snapshot"
    );

    Ok(Self {
      state:          Mutex::new(CacheState {
        entries:  entries.into_iter().map(|e| (e.key(), e)).collect(),
        absorbed: 0,
      }),
      writer:         Mutex::new(()),
      snapshot_path:  Some(path),
      snapshot_every: snapshot_every.max(1),
    })
  }

  /// Stage `entry`, replacing any previous entry for the same voter and look.
  ///
  /// Writes a snapshot when the cadence is reached. The entry is staged even
  /// if that snapshot fails.
  pub async fn absorb(&self, entry: FallbackEntry) -> Result<(), SnapshotError> {
    let due = {
      let mut state = self.state.lock().await;
      state.entries.insert(entry.key(), entry);
      state.absorbed += 1;
      state.absorbed % self.snapshot_every == 0
    };

    if due {
      self.snapshot().await?;
    }
    Ok(())
  }

  /// Every entry, ordered by key. Does not remove anything.
  pub async fn drain(&self) -> Vec<FallbackEntry> {
    self.state.lock().await.entries.values().cloned().collect()
  }

  pub async fn entries_for(&self, look_id: Uuid) -> Vec<FallbackEntry> {
    self
      .state
      .lock()
      .await
      .entries
      .values()
      .filter(|e| e.look_id == look_id)
      .cloned()
      .collect()
  }

  pub async fn has_entries_for(&self, look_id: Uuid) -> bool {
    self.state.lock().await.entries.values().any(|e| e.look_id == look_id)
  }

  /// Distinct looks referenced by any entry.
  pub async fn look_ids(&self) -> BTreeSet<Uuid> {
    self.state.lock().await.entries.values().map(|e| e.look_id).collect()
  }

  /// Stamp `folded` entries as reconciled at `at`. An entry replaced since it
  /// was read (different `updated_at`) is left unstamped.
  pub async fn mark_reconciled(&self, folded: &[FallbackEntry], at: DateTime<Utc>) {
    let mut state = self.state.lock().await;
    for entry in folded {
      if let Some(current) = state.entries.get_mut(&entry.key())
        && current.updated_at == entry.updated_at
      {
        current.reconciled_at = Some(at);
      }
    }
  }

  pub async fn len(&self) -> usize { self.state.lock().await.entries.len() }

  pub async fn is_empty(&self) -> bool { self.state.lock().await.entries.is_empty() }

  /// Serialise the full current contents over the previous snapshot.
  /// No-op for an in-memory cache.
  pub async fn snapshot(&self) -> Result<(), SnapshotError> {
    let Some(path) = &self.snapshot_path else {
      return Ok(());
    };

    let _writer = self.writer.lock().await;
    let entries = self.drain().await;
    write_snapshot(path, &entries).await?;
    tracing::debug!(path = %path.display(), entries = entries.len(), "wrote fallback snapshot");
    Ok(())
  }
}

// ─── Snapshot file ───────────────────────────────────────────────────────────

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SnapshotError + '_ {
  move |source| SnapshotError::Io { path: path.to_path_buf(), source }
}

async fn read_snapshot(path: &Path) -> Result<Vec<FallbackEntry>, SnapshotError> {
  let bytes = match tokio::fs::read(path).await {
    Ok(bytes) => bytes,
    Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
    Err(e) => return Err(io_error(path)(e)),
  };
  if bytes.is_empty() {
    return Ok(Vec::new());
  }
  Ok(serde_json::from_slice(&bytes)?)
}

/// `<path>.tmp`, next to the snapshot.
fn tmp_path_for(path: &Path) -> PathBuf {
  let mut tmp = path.as_os_str().to_owned();
  tmp.push(".tmp");
  PathBuf::from(tmp)
}

/// Write to a sibling temp file, then rename over `path`.
async fn write_snapshot(path: &Path, entries: &[FallbackEntry]) -> Result<(), SnapshotError> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    tokio::fs::create_dir_all(parent).await.map_err(io_error(parent))?;
  }

  let tmp_path = tmp_path_for(path);
  let bytes = serde_json::to_vec_pretty(entries)?;
  tokio::fs::write(&tmp_path, bytes).await.map_err(io_error(&tmp_path))?;
  tokio::fs::rename(&tmp_path, path).await.map_err(io_error(path))?;
  Ok(())
}
