//! Event filtering logic.
//!
//! The filter is purely local: changing the threshold never triggers a fetch.

use serde::Serialize;

use crate::client::Timeframe;
use crate::models::EventRecord;

/// User-controlled parameters governing which events are fetched and shown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FilterState {
    /// Recency window of the feed to fetch
    pub timeframe: Timeframe,
    /// Inclusive lower bound on magnitude; may be negative
    pub min_magnitude: f64,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::default(),
            min_magnitude: 0.0,
        }
    }
}

impl FilterState {
    /// Check if an event passes the magnitude threshold.
    ///
    /// Events without a magnitude never pass, whatever the threshold.
    #[must_use]
    pub fn matches(&self, event: &EventRecord) -> bool {
        event.magnitude.is_some_and(|m| m >= self.min_magnitude)
    }

    /// The visible subset of `events`, in feed order.
    pub fn visible<'a>(
        &'a self,
        events: &'a [EventRecord],
    ) -> impl Iterator<Item = &'a EventRecord> + 'a {
        events.iter().filter(move |e| self.matches(e))
    }
}
