//! Outbound frame helpers shared by the hub and the websocket handler.
//!
//! DESIGN
//! ======
//! Events are serialized exactly once and the resulting text is shared by
//! every connection that receives it. Typed errors carry a grepable code
//! that travels in the `code` field of `error` events.

use std::sync::Arc;

use protocol::Event;
use tracing::warn;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code for structured error events.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

/// Build a unicast `error` event from a typed error.
#[must_use]
pub fn error_event(err: &(impl ErrorCode + ?Sized)) -> Event {
    Event::Error { code: err.error_code().to_owned(), message: err.to_string() }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Serialize an event into a shareable text frame.
///
/// Returns `None` (and logs) if the event cannot be encoded.
#[must_use]
pub fn encode(event: &Event) -> Option<Arc<str>> {
    match protocol::encode_event(event) {
        Ok(text) => Some(Arc::from(text)),
        Err(e) => {
            warn!(error = %e, event = event.tag(), "failed to serialize event");
            None
        }
    }
}
