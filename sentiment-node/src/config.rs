//! Node configuration from environment variables

use std::env;
use std::time::Duration;

use crate::live_feed::DEFAULT_BUFFER_CAP;

/// Loaded from the environment (and `.env` via dotenv in the binaries),
/// then optionally overridden by CLI flags.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    /// Base URL of the dashboard REST API
    pub api_base_url: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Refresh and poll interval in seconds
    pub poll_interval_secs: u64,

    /// Capacity of the live feed's recent-items buffer
    pub feed_buffer_cap: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 10,
            poll_interval_secs: 30,
            feed_buffer_cap: DEFAULT_BUFFER_CAP,
        }
    }
}

impl NodeConfig {
    /// Environment variables:
    /// - `SENTIMENT_API_BASE_URL` (default: http://localhost:8000)
    /// - `REQUEST_TIMEOUT_SECS` (default: 10)
    /// - `POLL_INTERVAL_SECS` (default: 30)
    /// - `FEED_BUFFER_CAP` (default: 50)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            api_base_url: env::var("SENTIMENT_API_BASE_URL")
                .unwrap_or(defaults.api_base_url),

            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout_secs),

            poll_interval_secs: parse_var("POLL_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.poll_interval_secs),

            feed_buffer_cap: parse_var("FEED_BUFFER_CAP")
                .filter(|cap| *cap > 0)
                .unwrap_or(defaults.feed_buffer_cap),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}
