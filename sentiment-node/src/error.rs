use thiserror::Error;

/// Failure of a single data-source call, or of a whole refresh
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid JSON from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("All {0} data sources failed")]
    AllSourcesFailed(usize),

    #[error("No data sources configured")]
    NoSources,

    #[error("Channel unavailable: {0}")]
    ChannelUnavailable(String),
}

impl FetchError {
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { url: url.to_string() }
        } else if err.is_decode() {
            FetchError::Decode { url: url.to_string(), reason: err.to_string() }
        } else {
            FetchError::Transport { url: url.to_string(), source: err }
        }
    }
}
