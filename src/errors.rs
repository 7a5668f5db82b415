//! Error types for quakemap.
//!
//! Uses `thiserror` for library-style error definitions.

use thiserror::Error;

use crate::client::Timeframe;

/// A failed feed fetch, tagged with the timeframe that was requested.
#[derive(Error, Debug)]
#[error("failed to fetch {timeframe} feed")]
pub struct FetchError {
    pub timeframe: Timeframe,
    #[source]
    pub cause: FetchCause,
}

impl FetchError {
    #[must_use]
    pub fn new(timeframe: Timeframe, cause: impl Into<FetchCause>) -> Self {
        Self {
            timeframe,
            cause: cause.into(),
        }
    }
}

/// Underlying reason a fetch failed.
#[derive(Error, Debug)]
pub enum FetchCause {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// API returned an error status
    #[error("USGS API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid response structure
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl FetchCause {
    /// Whether a single retry has a reasonable chance of succeeding.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Parse(_) | Self::InvalidResponse(_) => false,
        }
    }
}
