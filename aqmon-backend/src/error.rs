//! Error types surfaced by the ingestion and interaction layers.

use std::time::Duration;

/// Failure of a single page fetch.
///
/// Both variants are non-fatal for the process: the sync controller records
/// them on the status board and stops the current run, keeping whatever was
/// already ingested.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// Network failure, timeout or non-success HTTP status.
    #[error("transport error: {0}")]
    Transport(String),
    /// The payload could not be parsed into a feed page.
    #[error("format error: {0}")]
    Format(String),
}

impl FetchError {
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }

    pub fn is_format(&self) -> bool {
        matches!(self, FetchError::Format(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Transport(format!("request timed out: {}", err))
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Format(err.to_string())
    }
}

/// Failure of the best-effort geolocation lookup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeolocationError {
    #[error("geolocation is not available")]
    Unavailable,
    #[error("geolocation permission denied: {0}")]
    Denied(String),
    #[error("geolocation timed out after {0:?}")]
    Timeout(Duration),
    #[error("no station with a known region near the current position")]
    NoRegion,
}
