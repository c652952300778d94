//! Shutdown coordinator — the bounded teardown run once a stop signal lands.
//!
//! SEQUENCE
//! ========
//! 1. Flip the shutdown flag: heartbeats stop, the throttled saver winds down
//! 2. `halt` the hub: clock stopped, further commands refused
//! 3. Wait for the saver to finish any write it already started
//! 4. Write the final snapshot, bounded by the save timeout
//! 5. Close every connection with the going-away status
//!
//! Steps 3 and 4 are each bounded; a store that never answers is abandoned
//! and the sequence moves on.
//!
//! WATCHDOG
//! ========
//! A `Watchdog` runs on its own OS thread, outside the runtime. Dropping the
//! runtime waits for blocking filesystem jobs, so an abandoned write can
//! outlive every tokio timer. The watchdog still fires in that case.

use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::time::Duration;

use protocol::MatchState;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::services::broadcast::{CLOSE_GOING_AWAY, SHUTDOWN_REASON};
use crate::services::hub::Hub;
use crate::services::persistence::{self, SnapshotStore};

// =============================================================================
// TYPES
// =============================================================================

/// What became of the final snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalSave {
    Saved,
    Failed,
    TimedOut,
    /// The hub was already gone, so there was no state to save.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub final_save: FinalSave,
    /// Connections that accepted the close frame.
    pub closed: usize,
}

// =============================================================================
// SEQUENCE
// =============================================================================

/// Run the shutdown sequence. Every step that touches the store is bounded by
/// `save_timeout`, so this returns even when the store hangs.
pub async fn run(
    hub: &Hub,
    store: &dyn SnapshotStore,
    saver: JoinHandle<()>,
    shutdown_tx: &watch::Sender<bool>,
    save_timeout: Duration,
) -> ShutdownReport {
    shutdown_tx.send_replace(true);

    let final_state = hub.halt().await;
    stop_saver(saver, save_timeout).await;

    let final_save = match final_state {
        Some(state) => save_final(store, &state, save_timeout).await,
        None => {
            warn!("hub already stopped; skipping final save");
            FinalSave::Skipped
        }
    };

    let closed = hub.close_all(CLOSE_GOING_AWAY, SHUTDOWN_REASON).await;
    info!(closed, ?final_save, "shutdown sequence complete");

    ShutdownReport { final_save, closed }
}

async fn stop_saver(saver: JoinHandle<()>, limit: Duration) {
    let abort = saver.abort_handle();
    match tokio::time::timeout(limit, saver).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "persistence task ended abnormally"),
        Err(_) => {
            abort.abort();
            warn!(timeout = ?limit, "persistence task still writing; abandoned");
        }
    }
}

async fn save_final(store: &dyn SnapshotStore, state: &MatchState, limit: Duration) -> FinalSave {
    match tokio::time::timeout(limit, persistence::save(store, state)).await {
        Ok(Ok(())) => {
            info!(team1 = state.team1_score, team2 = state.team2_score, time = state.time, "final state saved");
            FinalSave::Saved
        }
        Ok(Err(e)) => {
            error!(error = %e, "final state save failed");
            FinalSave::Failed
        }
        Err(_) => {
            error!(timeout = ?limit, "final state save timed out");
            FinalSave::TimedOut
        }
    }
}

// =============================================================================
// WATCHDOG
// =============================================================================

/// Fires `on_expire` on a dedicated thread unless dropped within `grace`.
pub struct Watchdog {
    _disarm: std_mpsc::Sender<()>,
}

impl Watchdog {
    #[must_use]
    pub fn arm(grace: Duration, on_expire: impl FnOnce() + Send + 'static) -> Self {
        let (disarm, disarmed) = std_mpsc::channel::<()>();
        let spawned = std::thread::Builder::new().name("shutdown-watchdog".into()).spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = disarmed.recv_timeout(grace) {
                on_expire();
            }
        });
        if let Err(e) = spawned {
            error!(error = %e, "failed to start shutdown watchdog");
        }
        Self { _disarm: disarm }
    }
}

/// Exit the process with a failure status. Used as the watchdog's action.
pub fn force_exit(grace: Duration) {
    error!(?grace, "shutdown did not finish in time; forcing exit");
    std::process::exit(1);
}

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod tests;
