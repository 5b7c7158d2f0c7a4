//! Environment configuration for the server and the watcher

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = var("SWAPDESK_DB_PATH").map_or_else(
            || {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".swapdesk").join("swapdesk.db")
            },
            PathBuf::from,
        );

        let port = var("SWAPDESK_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self { db_path, port }
    }
}

/// Watcher settings; command line flags override these
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub server_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl WatchConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |key: &str| {
            var(key)
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
        };

        Self {
            server_url: var("SWAPDESK_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            poll_interval: clamp_poll_interval(
                millis("SWAPDESK_POLL_INTERVAL_MS").unwrap_or(DEFAULT_POLL_INTERVAL),
            ),
            request_timeout: millis("SWAPDESK_REQUEST_TIMEOUT_MS")
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

pub fn clamp_poll_interval(interval: Duration) -> Duration {
    interval.max(MIN_POLL_INTERVAL)
}
