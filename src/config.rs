//! Hub configuration parsed from environment variables.
//!
//! Every knob has a typed default so the hub boots with no environment at
//! all. Unparseable values fall back to the default rather than failing.
//! Interval knobs are floored at one unit since tokio rejects zero periods.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_STATE_FILE: &str = "state_backup.json";
pub const DEFAULT_FONTS_DIR: &str = "./fonts";
pub const DEFAULT_PUBLIC_DIR: &str = "./public";
pub const DEFAULT_SAVE_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_SAVE_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub port: u16,
    /// Backup document written by the persistence manager.
    pub state_file: PathBuf,
    /// Directory scanned for the font catalog and served under `/fonts`.
    pub fonts_dir: PathBuf,
    /// Static control panel and display pages.
    pub public_dir: PathBuf,
    /// Minimum spacing between two throttled saves.
    pub save_interval: Duration,
    /// Ping cadence for connection liveness.
    pub heartbeat_interval: Duration,
    /// Match clock tick.
    pub tick_interval: Duration,
    /// Bound on the final save during shutdown.
    pub save_timeout: Duration,
    /// Bound on the whole shutdown sequence before a forced exit.
    pub shutdown_grace: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            fonts_dir: PathBuf::from(DEFAULT_FONTS_DIR),
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
            save_interval: Duration::from_secs(DEFAULT_SAVE_INTERVAL_SECS),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            save_timeout: Duration::from_secs(DEFAULT_SAVE_TIMEOUT_SECS),
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
        }
    }
}

impl HubConfig {
    /// Build the hub config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 8080
    /// - `STATE_FILE`: default `state_backup.json`
    /// - `FONTS_DIR`: default `./fonts`
    /// - `PUBLIC_DIR`: default `./public`
    /// - `SAVE_INTERVAL_SECS`: default 30
    /// - `HEARTBEAT_INTERVAL_SECS`: default 30
    /// - `TICK_INTERVAL_MS`: default 1000
    /// - `SAVE_TIMEOUT_SECS`: default 3
    /// - `SHUTDOWN_GRACE_SECS`: default 5
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            state_file: env_path("STATE_FILE", DEFAULT_STATE_FILE),
            fonts_dir: env_path("FONTS_DIR", DEFAULT_FONTS_DIR),
            public_dir: env_path("PUBLIC_DIR", DEFAULT_PUBLIC_DIR),
            save_interval: Duration::from_secs(env_parse("SAVE_INTERVAL_SECS", DEFAULT_SAVE_INTERVAL_SECS)),
            heartbeat_interval: Duration::from_secs(
                env_parse("HEARTBEAT_INTERVAL_SECS", DEFAULT_HEARTBEAT_INTERVAL_SECS).max(1),
            ),
            tick_interval: Duration::from_millis(env_parse("TICK_INTERVAL_MS", DEFAULT_TICK_INTERVAL_MS).max(1)),
            save_timeout: Duration::from_secs(env_parse("SAVE_TIMEOUT_SECS", DEFAULT_SAVE_TIMEOUT_SECS)),
            shutdown_grace: Duration::from_secs(env_parse("SHUTDOWN_GRACE_SECS", DEFAULT_SHUTDOWN_GRACE_SECS)),
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map_or_else(|| PathBuf::from(default), PathBuf::from)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
