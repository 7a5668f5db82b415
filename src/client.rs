//! USGS Earthquake API client.
//!
//! Provides async HTTP access to the USGS summary feeds.
//! Uses reqwest with rustls for TLS.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::errors::{FetchCause, FetchError};
use crate::models::{EventRecord, parse_feed};

/// Default request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Pause before the single retry of a transient failure.
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// User agent string for API requests.
const USER_AGENT: &str = concat!("quakemap/", env!("CARGO_PKG_VERSION"));

/// USGS base URL for earthquake feeds.
const USGS_BASE_URL: &str = "https://earthquake.usgs.gov";

/// Recency window of the summary feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    AllHour,
    #[default]
    AllDay,
    AllWeek,
}

impl Timeframe {
    pub const ALL: [Self; 3] = [Self::AllHour, Self::AllDay, Self::AllWeek];

    /// Get the URL path segment for this timeframe.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllHour => "all_hour",
            Self::AllDay => "all_day",
            Self::AllWeek => "all_week",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| {
                format!("unknown timeframe: {s} (expected: all_hour, all_day, all_week)")
            })
    }
}

/// Anything that can produce the event set for a timeframe.
pub trait FeedSource: Send + Sync + 'static {
    /// Fetch and normalize every event in the feed for `timeframe`.
    fn fetch_events(
        &self,
        timeframe: Timeframe,
    ) -> impl Future<Output = Result<Vec<EventRecord>, FetchError>> + Send;
}

/// Client for USGS earthquake API.
#[derive(Debug, Clone)]
pub struct UsgsClient {
    client: Client,
    base_url: String,
}

impl UsgsClient {
    /// Create a new USGS client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_base_url(USGS_BASE_URL)
    }

    /// Create a client against a different host, e.g. a mirror or a test server.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Summary feed URL for a timeframe.
    #[must_use]
    pub fn feed_url(&self, timeframe: Timeframe) -> String {
        format!(
            "{}/earthquakes/feed/v1.0/summary/{}.geojson",
            self.base_url,
            timeframe.as_str()
        )
    }

    /// Fetch the feed, retrying once on a transient failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or response cannot be parsed.
    #[instrument(skip(self), fields(feed = timeframe.as_str()))]
    pub async fn fetch(&self, timeframe: Timeframe) -> Result<Vec<EventRecord>, FetchError> {
        let url = self.feed_url(timeframe);

        let cause = match self.fetch_once(&url).await {
            Ok(records) => return Ok(records),
            Err(cause) if cause.is_transient() => cause,
            Err(cause) => return Err(FetchError::new(timeframe, cause)),
        };

        warn!("transient fetch failure, retrying once: {cause}");
        tokio::time::sleep(RETRY_DELAY).await;

        self.fetch_once(&url)
            .await
            .map_err(|cause| FetchError::new(timeframe, cause))
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<EventRecord>, FetchCause> {
        debug!("fetching feed from {}", url);

        let response = self.client.get(url).send().await?;

        // Check status before parsing
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchCause::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        let records = parse_feed(&body)?;

        debug!("fetched {} events", records.len());
        Ok(records)
    }
}

impl FeedSource for UsgsClient {
    fn fetch_events(
        &self,
        timeframe: Timeframe,
    ) -> impl Future<Output = Result<Vec<EventRecord>, FetchError>> + Send {
        self.fetch(timeframe)
    }
}
