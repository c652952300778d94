//! Reconnection agent — fixed-interval, bounded retries.
//!
//! Every disconnect (or failed connect) consumes one attempt and waits the
//! same interval before the next try. A successful connection resets the
//! counter. Once the attempts run out the agent gives up for good and the
//! caller surfaces a persistent failure.

use std::time::Duration;

pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { interval: DEFAULT_RETRY_INTERVAL, max_attempts: DEFAULT_MAX_ATTEMPTS }
    }
}

/// What to do after losing the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Wait `after`, then make attempt number `attempt`.
    Retry { attempt: u32, after: Duration },
    /// The attempt budget is spent.
    GiveUp { attempts: u32 },
}

#[derive(Debug)]
pub struct Reconnector {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl Reconnector {
    #[must_use]
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn on_connected(&mut self) {
        self.attempts = 0;
    }

    pub fn on_disconnected(&mut self) -> Decision {
        if self.attempts >= self.policy.max_attempts {
            return Decision::GiveUp { attempts: self.attempts };
        }
        self.attempts += 1;
        Decision::Retry { attempt: self.attempts, after: self.policy.interval }
    }
}

#[cfg(test)]
#[path = "reconnect_test.rs"]
mod tests;
