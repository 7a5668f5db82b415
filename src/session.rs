//! Async driver that runs fetches on behalf of the view model.
//!
//! Each ticket gets its own tokio task. Issuing a newer ticket aborts the
//! task still in flight; the token check in [`ViewModel::apply`] covers the
//! window where an aborted task has already received its response.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::client::{FeedSource, Timeframe};
use crate::filters::FilterState;
use crate::view_model::{ApplyOutcome, FetchTicket, Snapshot, ViewModel};

/// Capacity of the update notification channel.
const UPDATE_CHANNEL_CAPACITY: usize = 16;

pub struct Session<S> {
    source: Arc<S>,
    view: Arc<Mutex<ViewModel>>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
    updates: broadcast::Sender<u64>,
}

impl<S: FeedSource> Session<S> {
    pub fn new(source: S, filter: FilterState) -> Self {
        let (updates, _rx) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            source: Arc::new(source),
            view: Arc::new(Mutex::new(ViewModel::new(filter))),
            in_flight: Mutex::new(None),
            updates,
        }
    }

    /// Switch timeframe and fetch it.
    pub async fn set_timeframe(&self, timeframe: Timeframe) -> Snapshot {
        self.dispatch(|view| view.set_timeframe(timeframe)).await
    }

    /// Re-fetch the current timeframe.
    pub async fn refresh(&self) -> Snapshot {
        self.dispatch(ViewModel::refresh).await
    }

    /// Change the magnitude threshold; no fetch.
    pub async fn set_min_magnitude(&self, min_magnitude: f64) -> Snapshot {
        let mut view = self.view.lock().await;
        view.set_min_magnitude(min_magnitude);
        let _ = self.updates.send(0);
        view.snapshot()
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.view.lock().await.snapshot()
    }

    /// Notifications carrying the token of each applied result, or 0 for a
    /// local filter change.
    pub fn subscribe(&self) -> broadcast::Receiver<u64> {
        self.updates.subscribe()
    }

    /// Wait for the latest in-flight fetch to finish.
    #[cfg(test)]
    pub async fn settle(&self) {
        let handle = self.in_flight.lock().await.take();
        if let Some(handle) = handle {
            // Cancelled or panicked fetches leave the view untouched.
            let _ = handle.await;
        }
    }

    async fn dispatch(&self, issue: impl FnOnce(&mut ViewModel) -> FetchTicket) -> Snapshot {
        // Held across issue and spawn so concurrent callers cannot abort a
        // newer ticket's task in favour of an older one.
        let mut in_flight = self.in_flight.lock().await;

        let (ticket, snapshot) = {
            let mut view = self.view.lock().await;
            let ticket = issue(&mut *view);
            (ticket, view.snapshot())
        };

        let handle = self.spawn_fetch(ticket);
        if let Some(previous) = in_flight.replace(handle) {
            previous.abort();
        }
        snapshot
    }

    fn spawn_fetch(&self, ticket: FetchTicket) -> JoinHandle<()> {
        let source = Arc::clone(&self.source);
        let view = Arc::clone(&self.view);
        let updates = self.updates.clone();

        debug!(token = ticket.token(), "fetching {} feed", ticket.timeframe());
        tokio::spawn(async move {
            let result = source.fetch_events(ticket.timeframe()).await;
            let outcome = view.lock().await.apply(ticket, result);
            if outcome != ApplyOutcome::Stale {
                let _ = updates.send(ticket.token());
            }
        })
    }
}
