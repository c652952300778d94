//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It carries the hub handle, the heartbeat cadence, and the shutdown flag
//! that tells connection tasks to stop pinging. The match state itself
//! lives inside the hub actor, never here.

use std::time::Duration;

use tokio::sync::watch;

use crate::services::hub::Hub;

/// Shared application state, injected into Axum handlers via State extractor.
#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    pub heartbeat_interval: Duration,
    /// Flips to `true` once graceful shutdown begins.
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    #[must_use]
    pub fn new(hub: Hub, heartbeat_interval: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self { hub, heartbeat_interval, shutdown }
    }

    #[must_use]
    pub fn shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}
