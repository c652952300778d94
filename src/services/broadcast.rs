//! Broadcast hub — the live connection set and event fan-out.
//!
//! DESIGN
//! ======
//! Each connection is represented by the sending half of a bounded queue;
//! the websocket task on the other end owns the socket. An event is
//! serialized once and the same `Arc<str>` is queued for every connection.
//!
//! ERROR HANDLING
//! ==============
//! A closed or full queue marks the connection dead. Dead connections are
//! collected during the sweep and removed only after it, so the set is
//! never mutated while being iterated. Dropping the sender is what tells
//! the websocket task to close the socket.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use protocol::Event;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame;

/// Per-connection outbound queue depth.
pub const CLIENT_QUEUE_CAPACITY: usize = 256;

/// Websocket close code sent when the hub shuts down (going away).
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Close reason sent alongside [`CLOSE_GOING_AWAY`].
pub const SHUTDOWN_REASON: &str = "server shutting down";

/// Something the websocket task should write to its socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A serialized event.
    Text(Arc<str>),
    /// Close the socket with this status and reason, then stop.
    Close { code: u16, reason: &'static str },
}

struct Connection {
    tx: mpsc::Sender<Outbound>,
    /// Diagnostic only.
    addr: SocketAddr,
}

/// The set of live connections.
#[derive(Default)]
pub struct Connections {
    clients: HashMap<Uuid, Connection>,
}

impl Connections {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    #[must_use]
    pub fn contains(&self, client_id: Uuid) -> bool {
        self.clients.contains_key(&client_id)
    }

    /// Add a connection to the live set.
    pub fn join(&mut self, client_id: Uuid, addr: SocketAddr, tx: mpsc::Sender<Outbound>) {
        self.clients.insert(client_id, Connection { tx, addr });
        info!(%client_id, %addr, clients = self.clients.len(), "connection joined");
    }

    /// Remove a connection. Returns whether it was present.
    pub fn leave(&mut self, client_id: Uuid) -> bool {
        let Some(conn) = self.clients.remove(&client_id) else {
            return false;
        };
        info!(%client_id, addr = %conn.addr, clients = self.clients.len(), "connection left");
        true
    }

    /// Serialize once and queue for every live connection.
    ///
    /// Returns the number of connections the event was queued for.
    pub fn broadcast(&mut self, event: &Event) -> usize {
        let Some(text) = frame::encode(event) else {
            return 0;
        };
        self.broadcast_text(&text)
    }

    /// Queue an already serialized frame for every live connection.
    pub fn broadcast_text(&mut self, text: &Arc<str>) -> usize {
        let mut dead = Vec::new();
        let mut delivered = 0;

        for (client_id, conn) in &self.clients {
            match conn.tx.try_send(Outbound::Text(Arc::clone(text))) {
                Ok(()) => delivered += 1,
                Err(e) => dead.push((*client_id, describe(&e))),
            }
        }

        self.reap(dead);
        delivered
    }

    /// Queue an event for a single connection. Returns whether it was queued.
    pub fn send_to_one(&mut self, client_id: Uuid, event: &Event) -> bool {
        let Some(conn) = self.clients.get(&client_id) else {
            return false;
        };
        let Some(text) = frame::encode(event) else {
            return false;
        };
        match conn.tx.try_send(Outbound::Text(text)) {
            Ok(()) => true,
            Err(e) => {
                self.reap(vec![(client_id, describe(&e))]);
                false
            }
        }
    }

    /// Ask every connection to close, then empty the set.
    ///
    /// Returns the number of connections that accepted the close request.
    pub fn close_all(&mut self, code: u16, reason: &'static str) -> usize {
        let mut closed = 0;
        for (client_id, conn) in self.clients.drain() {
            if conn.tx.try_send(Outbound::Close { code, reason }).is_ok() {
                closed += 1;
            } else {
                warn!(%client_id, addr = %conn.addr, "close request not queued; dropping connection");
            }
        }
        closed
    }

    fn reap(&mut self, dead: Vec<(Uuid, &'static str)>) {
        for (client_id, cause) in dead {
            if let Some(conn) = self.clients.remove(&client_id) {
                warn!(%client_id, addr = %conn.addr, cause, clients = self.clients.len(), "reaped dead connection");
            }
        }
    }
}

fn describe<T>(err: &TrySendError<T>) -> &'static str {
    match err {
        TrySendError::Full(_) => "queue full",
        TrySendError::Closed(_) => "queue closed",
    }
}

#[cfg(test)]
#[path = "broadcast_test.rs"]
mod tests;
