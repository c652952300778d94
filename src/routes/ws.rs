//! WebSocket handler — one task per connection.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID, registers with the hub, and enters a
//! `select!` loop:
//! - Incoming text frames → parse + validate → submit to the hub
//! - Outbound queue from the hub → write to the socket
//! - Heartbeat tick → ping, or terminate if the last ping went unanswered
//!
//! Parse and validation errors are written straight back to this socket;
//! they never reach the hub and no other connection sees them.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → hub `join` → `full_state` + `available_fonts` queued
//! 2. Client sends commands → hub applies and broadcasts
//! 3. Close, transport error, heartbeat timeout, or hub close → hub `leave`

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use protocol::Event;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{self, ErrorCode, error_event};
use crate::services::broadcast::{CLIENT_QUEUE_CAPACITY, CLOSE_GOING_AWAY, Outbound, SHUTDOWN_REASON};
use crate::services::validate::{CommandError, parse_frame};
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state, addr))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, addr: SocketAddr) {
    let client_id = Uuid::new_v4();

    // Per-connection queue fed by the hub.
    let (client_tx, mut client_rx) = mpsc::channel::<Outbound>(CLIENT_QUEUE_CAPACITY);

    if !state.hub.join(client_id, addr, client_tx).await {
        warn!(%client_id, %addr, "ws: hub unavailable; refusing connection");
        let _ = socket.send(close_message(CLOSE_GOING_AWAY, SHUTDOWN_REASON)).await;
        return;
    }

    info!(%client_id, %addr, "ws: client connected");

    let period = state.heartbeat_interval;
    let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
    let mut is_alive = true;

    let reason = loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break "transport closed" };
                match msg {
                    Message::Text(text) => {
                        if !handle_text(&state, &mut socket, client_id, text.as_str()).await {
                            break "dispatch failed";
                        }
                    }
                    Message::Binary(_) => {
                        let err = CommandError::MalformedPayload("binary frames are not supported".into());
                        if !reply_error(&mut socket, client_id, &err).await {
                            break "send failed";
                        }
                    }
                    Message::Pong(_) => is_alive = true,
                    Message::Ping(_) => {}
                    Message::Close(_) => break "client closed",
                }
            }
            outbound = client_rx.recv() => {
                match outbound {
                    Some(Outbound::Text(text)) => {
                        if socket.send(Message::Text(Utf8Bytes::from(&*text))).await.is_err() {
                            break "send failed";
                        }
                    }
                    Some(Outbound::Close { code, reason }) => {
                        let _ = socket.send(close_message(code, reason)).await;
                        break "closed by hub";
                    }
                    None => break "dropped by hub",
                }
            }
            _ = heartbeat.tick(), if !state.shutting_down() => {
                if !is_alive {
                    break "heartbeat timeout";
                }
                is_alive = false;
                if socket.send(Message::Ping(Bytes::new())).await.is_err() {
                    break "ping failed";
                }
            }
        }
    };

    state.hub.leave(client_id).await;
    info!(%client_id, %addr, reason, "ws: client disconnected");
}

// =============================================================================
// INBOUND
// =============================================================================

/// Parse one text frame and hand the command to the hub. Returns `false`
/// when the connection should be torn down.
async fn handle_text(state: &AppState, socket: &mut WebSocket, client_id: Uuid, text: &str) -> bool {
    match parse_frame(text) {
        Ok(command) => {
            if state.hub.submit(client_id, command).await {
                true
            } else {
                warn!(%client_id, "ws: hub unavailable; dropping connection");
                false
            }
        }
        Err(err) => reply_error(socket, client_id, &err).await,
    }
}

async fn reply_error(socket: &mut WebSocket, client_id: Uuid, err: &CommandError) -> bool {
    warn!(%client_id, code = err.error_code(), error = %err, "ws: command rejected");
    send_event(socket, &error_event(err)).await
}

async fn send_event(socket: &mut WebSocket, event: &Event) -> bool {
    let Some(text) = frame::encode(event) else {
        return true;
    };
    socket.send(Message::Text(Utf8Bytes::from(&*text))).await.is_ok()
}

fn close_message(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame { code, reason: Utf8Bytes::from_static(reason) }))
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
