//! View model: the explicit state container behind the map.
//!
//! Owns the filter state and the last successfully fetched event set.
//! Every fetch is issued as a [`FetchTicket`] carrying a monotonically
//! increasing token; only the result for the most recently issued ticket may
//! change the state, so out-of-order responses can never show stale data.

use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::Timeframe;
use crate::errors::FetchError;
use crate::filters::FilterState;
use crate::markers::MarkerDescriptor;
use crate::models::EventRecord;

/// Permission to apply one fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    token: u64,
    timeframe: Timeframe,
}

impl FetchTicket {
    #[must_use]
    pub fn token(self) -> u64 {
        self.token
    }

    #[must_use]
    pub fn timeframe(self) -> Timeframe {
        self.timeframe
    }
}

/// What [`ViewModel::apply`] did with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The event set was replaced
    Applied { count: usize },
    /// The fetch failed; the previous set is still shown
    Failed,
    /// A newer ticket was issued; the result was discarded
    Stale,
}

/// Feed state as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    /// Nothing fetched yet, nothing in flight
    Idle,
    /// The latest fetch has not completed
    Loading,
    /// Showing the result of the latest fetch
    Ready,
    /// The latest fetch failed; showing last known data, if any
    Unavailable,
}

/// The most recent fetch failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedFailure {
    pub timeframe: Timeframe,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Everything the UI needs to draw one frame.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub filter: FilterState,
    pub status: FeedStatus,
    pub failure: Option<FeedFailure>,
    /// Timeframe the shown events were fetched for
    pub shown_timeframe: Option<Timeframe>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Size of the full event set, before filtering
    pub event_count: usize,
    pub markers: Vec<MarkerDescriptor>,
}

#[derive(Debug, Default)]
pub struct ViewModel {
    filter: FilterState,
    events: Vec<EventRecord>,
    shown_timeframe: Option<Timeframe>,
    updated_at: Option<DateTime<Utc>>,
    failure: Option<FeedFailure>,
    latest_token: u64,
    pending: bool,
}

impl ViewModel {
    #[must_use]
    pub fn new(filter: FilterState) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Switch the timeframe and issue a fetch for it.
    pub fn set_timeframe(&mut self, timeframe: Timeframe) -> FetchTicket {
        if timeframe != self.filter.timeframe {
            info!("timeframe changed: {} -> {}", self.filter.timeframe, timeframe);
        }
        self.filter.timeframe = timeframe;
        self.issue()
    }

    /// Change the magnitude threshold. Filtering is local, so nothing is fetched.
    pub fn set_min_magnitude(&mut self, min_magnitude: f64) {
        debug!("min magnitude set to {min_magnitude}");
        self.filter.min_magnitude = min_magnitude;
    }

    /// Issue a fetch for the current timeframe without touching the filter.
    pub fn refresh(&mut self) -> FetchTicket {
        self.issue()
    }

    fn issue(&mut self) -> FetchTicket {
        self.latest_token += 1;
        self.pending = true;
        FetchTicket {
            token: self.latest_token,
            timeframe: self.filter.timeframe,
        }
    }

    /// Apply the result of the fetch `ticket` was issued for.
    pub fn apply(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<EventRecord>, FetchError>,
    ) -> ApplyOutcome {
        if ticket.token != self.latest_token {
            debug!(
                token = ticket.token,
                latest = self.latest_token,
                "discarding stale {} result",
                ticket.timeframe
            );
            return ApplyOutcome::Stale;
        }

        self.pending = false;
        match result {
            Ok(events) => {
                let count = events.len();
                self.events = events;
                self.shown_timeframe = Some(ticket.timeframe);
                self.updated_at = Some(Utc::now());
                self.failure = None;
                info!("showing {} events from {} feed", count, ticket.timeframe);
                ApplyOutcome::Applied { count }
            }
            Err(err) => {
                warn!("{err}: {}; keeping last known data", err.cause);
                self.failure = Some(FeedFailure {
                    timeframe: err.timeframe,
                    message: err.cause.to_string(),
                    at: Utc::now(),
                });
                ApplyOutcome::Failed
            }
        }
    }

    #[must_use]
    pub fn filter(&self) -> FilterState {
        self.filter
    }

    /// The full event set from the last successful fetch.
    #[must_use]
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    #[must_use]
    pub fn failure(&self) -> Option<&FeedFailure> {
        self.failure.as_ref()
    }

    #[must_use]
    pub fn status(&self) -> FeedStatus {
        if self.pending {
            FeedStatus::Loading
        } else if self.failure.is_some() {
            FeedStatus::Unavailable
        } else if self.shown_timeframe.is_some() {
            FeedStatus::Ready
        } else {
            FeedStatus::Idle
        }
    }

    pub fn visible(&self) -> impl Iterator<Item = &EventRecord> {
        self.filter.visible(&self.events)
    }

    /// Markers for the visible events, popup times in the local zone.
    #[must_use]
    pub fn markers(&self) -> Vec<MarkerDescriptor> {
        self.markers_in(&Local)
    }

    pub fn markers_in<Tz>(&self, tz: &Tz) -> Vec<MarkerDescriptor>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        self.visible()
            .map(|e| MarkerDescriptor::from_record_in(e, tz))
            .collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            filter: self.filter(),
            status: self.status(),
            failure: self.failure().cloned(),
            shown_timeframe: self.shown_timeframe,
            updated_at: self.updated_at,
            event_count: self.events().len(),
            markers: self.markers(),
        }
    }
}
