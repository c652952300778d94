//! Hub — sole owner of the match state and the live connection set.
//!
//! ARCHITECTURE
//! ============
//! A single actor task owns `MatchState` and `Connections`. Everything that
//! touches either goes through its inbox: joins, leaves, validated commands,
//! snapshot requests, and the shutdown steps. The match clock ticks inside
//! the same `select!` loop, so a tick and a command can never interleave.
//!
//! Because events are queued to connections from inside the actor, every
//! connection sees events in exactly the order their mutations were applied,
//! and a joining connection gets its `full_state` at a consistent point in
//! that order.
//!
//! LIFECYCLE
//! =========
//! 1. `Hub::spawn` with the recovered state and font catalog
//! 2. Connections `join`/`leave`; commands arrive via `submit`
//! 3. `halt` stops the clock and returns the final snapshot
//! 4. `close_all` closes every connection with a going-away status

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use protocol::{Command, Event, FontDescriptor, MatchState};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{ErrorCode, error_event};
use crate::services::broadcast::{Connections, Outbound};
use crate::services::command::{self, Outcome};
use crate::services::{fonts, timer};

const INBOX_CAPACITY: usize = 1024;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("hub is shutting down")]
    ShuttingDown,
}

impl ErrorCode for HubError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ShuttingDown => "E_SHUTTING_DOWN",
        }
    }
}

/// Knobs the actor needs at spawn time.
#[derive(Debug, Clone)]
pub struct HubSettings {
    pub tick_interval: Duration,
    pub fonts_dir: PathBuf,
}

/// A consistent copy of the match state.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Number of mutations applied since boot.
    pub revision: u64,
    pub state: MatchState,
}

enum HubMessage {
    Join { client_id: Uuid, addr: SocketAddr, tx: mpsc::Sender<Outbound> },
    Leave { client_id: Uuid },
    Command { client_id: Uuid, command: Command },
    FontsLoaded(Vec<FontDescriptor>),
    Snapshot { reply: oneshot::Sender<Snapshot> },
    Halt { reply: oneshot::Sender<MatchState> },
    CloseAll { code: u16, reason: &'static str, reply: oneshot::Sender<usize> },
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cloneable handle to the hub actor.
#[derive(Clone)]
pub struct Hub {
    tx: mpsc::Sender<HubMessage>,
    revisions: watch::Receiver<u64>,
}

impl Hub {
    /// Spawn the hub actor. The actor stops when every handle is dropped.
    #[must_use]
    pub fn spawn(state: MatchState, fonts: Vec<FontDescriptor>, settings: HubSettings) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let (revision_tx, revisions) = watch::channel(0);

        let actor = HubActor {
            state,
            fonts,
            connections: Connections::new(),
            revision: 0,
            revision_tx,
            halted: false,
            fonts_dir: settings.fonts_dir,
            inbox: tx.downgrade(),
        };
        let handle = tokio::spawn(actor.run(rx, settings.tick_interval));

        (Self { tx, revisions }, handle)
    }

    /// Register a connection. It is sent `full_state` then `available_fonts`
    /// before any later broadcast. Returns `false` if the hub is gone.
    pub async fn join(&self, client_id: Uuid, addr: SocketAddr, tx: mpsc::Sender<Outbound>) -> bool {
        self.tx.send(HubMessage::Join { client_id, addr, tx }).await.is_ok()
    }

    pub async fn leave(&self, client_id: Uuid) {
        let _ = self.tx.send(HubMessage::Leave { client_id }).await;
    }

    /// Submit a validated command. Returns `false` if the hub is gone.
    pub async fn submit(&self, client_id: Uuid, command: Command) -> bool {
        self.tx.send(HubMessage::Command { client_id, command }).await.is_ok()
    }

    /// Take a consistent snapshot of the match state.
    pub async fn snapshot(&self) -> Option<Snapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(HubMessage::Snapshot { reply }).await.ok()?;
        rx.await.ok()
    }

    /// Stop the clock and refuse further commands. Returns the final state.
    pub async fn halt(&self) -> Option<MatchState> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(HubMessage::Halt { reply }).await.ok()?;
        rx.await.ok()
    }

    /// Close every live connection. Returns how many accepted the close.
    pub async fn close_all(&self, code: u16, reason: &'static str) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(HubMessage::CloseAll { code, reason, reply }).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Watch channel carrying the latest mutation revision.
    #[must_use]
    pub fn revisions(&self) -> watch::Receiver<u64> {
        self.revisions.clone()
    }
}

// =============================================================================
// ACTOR
// =============================================================================

struct HubActor {
    state: MatchState,
    fonts: Vec<FontDescriptor>,
    connections: Connections,
    revision: u64,
    revision_tx: watch::Sender<u64>,
    halted: bool,
    fonts_dir: PathBuf,
    /// Weak so that dropping every `Hub` handle still ends the actor.
    inbox: mpsc::WeakSender<HubMessage>,
}

impl HubActor {
    async fn run(mut self, mut rx: mpsc::Receiver<HubMessage>, tick_interval: Duration) {
        let mut ticker = tokio::time::interval_at(Instant::now() + tick_interval, tick_interval);
        // Each tick is one match second; a stalled actor catches up rather than losing time.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    self.handle(msg);
                }
                _ = ticker.tick(), if !self.halted => {
                    self.on_tick();
                }
            }
        }

        info!(revision = self.revision, "hub stopped");
    }

    fn handle(&mut self, msg: HubMessage) {
        match msg {
            HubMessage::Join { client_id, addr, tx } => self.on_join(client_id, addr, tx),
            HubMessage::Leave { client_id } => {
                self.connections.leave(client_id);
            }
            HubMessage::Command { client_id, command } => self.on_command(client_id, command),
            HubMessage::FontsLoaded(fonts) => {
                self.fonts = fonts;
                self.connections.broadcast(&Event::AvailableFonts { fonts: self.fonts.clone() });
            }
            HubMessage::Snapshot { reply } => {
                let _ = reply.send(Snapshot { revision: self.revision, state: self.state.clone() });
            }
            HubMessage::Halt { reply } => {
                self.halted = true;
                info!(revision = self.revision, "hub halted; clock stopped");
                let _ = reply.send(self.state.clone());
            }
            HubMessage::CloseAll { code, reason, reply } => {
                let closed = self.connections.close_all(code, reason);
                let _ = reply.send(closed);
            }
        }
    }

    fn on_join(&mut self, client_id: Uuid, addr: SocketAddr, tx: mpsc::Sender<Outbound>) {
        self.connections.join(client_id, addr, tx);
        if self.connections.send_to_one(client_id, &Event::full_state(&self.state)) {
            self.connections
                .send_to_one(client_id, &Event::AvailableFonts { fonts: self.fonts.clone() });
        }
    }

    fn on_command(&mut self, client_id: Uuid, command: Command) {
        let name = command.name();
        if self.halted {
            warn!(%client_id, command = name, "command refused during shutdown");
            self.connections.send_to_one(client_id, &error_event(&HubError::ShuttingDown));
            return;
        }

        let outcome = command::apply(&mut self.state, command);
        if outcome.mutates() {
            self.bump_revision();
            info!(%client_id, command = name, revision = self.revision, "command applied");
        }

        match outcome {
            Outcome::Broadcast(events) => {
                for event in &events {
                    self.connections.broadcast(event);
                }
            }
            Outcome::Reply(event) => {
                self.connections.send_to_one(client_id, &event);
            }
            Outcome::ReloadFonts => self.reload_fonts(),
        }
    }

    fn on_tick(&mut self) {
        let Some(event) = timer::tick(&mut self.state) else {
            return;
        };
        self.bump_revision();
        if !self.state.timer_running {
            info!(half = self.state.current_half.as_u8(), time = self.state.time, "half ended; clock auto-stopped");
        }
        self.connections.broadcast(&event);
    }

    /// Scan the font directory off the actor, then re-enter via the inbox.
    fn reload_fonts(&self) {
        let dir = self.fonts_dir.clone();
        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            let catalog = fonts::load_catalog(&dir).await;
            if let Some(tx) = inbox.upgrade() {
                let _ = tx.send(HubMessage::FontsLoaded(catalog)).await;
            }
        });
    }

    fn bump_revision(&mut self) {
        self.revision += 1;
        self.revision_tx.send_replace(self.revision);
    }
}

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;
