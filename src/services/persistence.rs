//! Persistence service — throttled snapshots of the match state.
//!
//! DESIGN
//! ======
//! The hub publishes a revision counter on a watch channel. A background
//! task waits for the counter to move, takes a consistent snapshot from the
//! hub, writes it, then sleeps for the save interval. Any number of
//! mutations inside one window collapse into a single write, and a write
//! never blocks the hub.
//!
//! A failed write is logged and retried after the next window even if no
//! further mutation arrives. Once the shutdown flag flips, the task finishes
//! any write already in progress and returns, so the final save never races
//! a throttled one.
//!
//! DOCUMENT
//! ========
//! The snapshot is the `MatchState` fields plus `timestamp` (RFC 3339) and
//! `version`. Loading accepts only a recognized version with both scores
//! present; anything else falls back to the default state.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use protocol::MatchState;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::services::command::enforce_invariants;
use crate::services::hub::Hub;

/// Schema version written to, and required from, snapshot documents.
pub const SCHEMA_VERSION: &str = "1";

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("snapshot io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("snapshot timestamp failed: {0}")]
    Timestamp(#[from] time::error::Format),
}

// =============================================================================
// STORE
// =============================================================================

/// Durable location for the single snapshot document. Enables mocking in tests.
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Replace the stored document.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the document cannot be written.
    async fn write(&self, document: &[u8]) -> Result<(), PersistenceError>;

    /// Read the stored document, `None` if nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the document exists but cannot be read.
    async fn read(&self) -> Result<Option<Vec<u8>>, PersistenceError>;
}

/// Snapshot stored as a JSON file. Each write goes to its own sibling temp
/// file which is then renamed over the target, so a crash mid-write keeps the
/// old snapshot and two overlapping writes never share a file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(ToOwned::to_owned).unwrap_or_default();
        name.push(format!(".{}.tmp", Uuid::new_v4()));
        self.path.with_file_name(name)
    }
}

#[async_trait::async_trait]
impl SnapshotStore for FileStore {
    async fn write(&self, document: &[u8]) -> Result<(), PersistenceError> {
        let temp = self.temp_path();
        let written = match tokio::fs::write(&temp, document).await {
            Ok(()) => tokio::fs::rename(&temp, &self.path).await,
            Err(e) => Err(e),
        };
        if written.is_err() {
            let _ = tokio::fs::remove_file(&temp).await;
        }
        Ok(written?)
    }

    async fn read(&self) -> Result<Option<Vec<u8>>, PersistenceError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// DOCUMENT
// =============================================================================

#[derive(Serialize)]
struct SnapshotDocument<'a> {
    #[serde(flatten)]
    state: &'a MatchState,
    timestamp: String,
    version: &'static str,
}

/// Serialize `state` into a snapshot document stamped with `now`.
///
/// # Errors
///
/// Returns a [`PersistenceError`] if the timestamp or JSON cannot be produced.
pub fn encode_snapshot(state: &MatchState, now: OffsetDateTime) -> Result<Vec<u8>, PersistenceError> {
    let document = SnapshotDocument { state, timestamp: now.format(&Rfc3339)?, version: SCHEMA_VERSION };
    Ok(serde_json::to_vec_pretty(&document)?)
}

/// Parse a snapshot document. `None` when the document is malformed, has an
/// unrecognized version, or lacks either score.
#[must_use]
pub fn decode_snapshot(bytes: &[u8]) -> Option<MatchState> {
    let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    let object = value.as_object()?;

    if object.get("version").and_then(serde_json::Value::as_str) != Some(SCHEMA_VERSION) {
        return None;
    }
    if !object.contains_key("team1Score") || !object.contains_key("team2Score") {
        return None;
    }

    let mut state: MatchState = serde_json::from_value(value).ok()?;
    enforce_invariants(&mut state);
    Some(state)
}

// =============================================================================
// LOAD / SAVE
// =============================================================================

/// Recover the match state at startup. Never fails: any problem with the
/// stored document yields the default state.
pub async fn load(store: &dyn SnapshotStore) -> MatchState {
    let bytes = match store.read().await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            info!("no saved state; starting from defaults");
            return MatchState::default();
        }
        Err(e) => {
            warn!(error = %e, "saved state unreadable; starting from defaults");
            return MatchState::default();
        }
    };

    match decode_snapshot(&bytes) {
        Some(state) => {
            info!(
                team1 = state.team1_score,
                team2 = state.team2_score,
                time = state.time,
                half = state.current_half.as_u8(),
                "restored saved state"
            );
            state
        }
        None => {
            warn!("saved state malformed or unrecognized; starting from defaults");
            MatchState::default()
        }
    }
}

/// Write one snapshot of `state`.
///
/// # Errors
///
/// Returns a [`PersistenceError`] if encoding or the store write fails.
pub async fn save(store: &dyn SnapshotStore, state: &MatchState) -> Result<(), PersistenceError> {
    let document = encode_snapshot(state, OffsetDateTime::now_utc())?;
    store.write(&document).await
}

/// Spawn the throttled save task. It returns once `shutdown` flips to `true`,
/// after finishing any write already underway.
pub fn spawn_persistence_task(
    hub: Hub,
    store: Arc<dyn SnapshotStore>,
    save_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut revisions = hub.revisions();
        let mut retry = false;

        loop {
            if !retry {
                tokio::select! {
                    changed = revisions.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    () = stopped(&mut shutdown) => break,
                }
            }
            revisions.borrow_and_update();

            let Some(snapshot) = hub.snapshot().await else {
                break;
            };
            retry = match save(store.as_ref(), &snapshot.state).await {
                Ok(()) => {
                    info!(revision = snapshot.revision, "state saved");
                    false
                }
                Err(e) => {
                    error!(error = %e, revision = snapshot.revision, "state save failed; will retry");
                    true
                }
            };

            tokio::select! {
                () = tokio::time::sleep(save_interval) => {}
                () = stopped(&mut shutdown) => break,
            }
        }

        info!("persistence task stopped");
    })
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
