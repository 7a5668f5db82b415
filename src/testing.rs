//! Test fixtures shared across modules.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::client::{FeedSource, Timeframe};
use crate::errors::{FetchCause, FetchError};
use crate::models::{EventRecord, Position};

/// An event at a fixed spot with the given magnitude and depth.
pub fn record(id: &str, magnitude: Option<f64>, depth_km: f64) -> EventRecord {
    EventRecord {
        id: id.to_string(),
        position: Position {
            longitude: -117.5,
            latitude: 35.7,
            depth_km,
        },
        magnitude,
        place: format!("near {id}"),
        time_ms: 1_760_780_096_000,
    }
}

#[derive(Clone)]
struct Script {
    delay: Duration,
    outcome: Result<Vec<EventRecord>, String>,
}

/// Feed source answering from per-timeframe scripts after a delay.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<HashMap<Timeframe, Script>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn respond(&self, timeframe: Timeframe, delay: Duration, events: Vec<EventRecord>) {
        self.set(timeframe, Script {
            delay,
            outcome: Ok(events),
        });
    }

    pub fn fail(&self, timeframe: Timeframe, delay: Duration, message: &str) {
        self.set(timeframe, Script {
            delay,
            outcome: Err(message.to_string()),
        });
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn set(&self, timeframe: Timeframe, script: Script) {
        self.scripts
            .lock()
            .expect("scripts lock poisoned")
            .insert(timeframe, script);
    }
}

impl FeedSource for ScriptedSource {
    fn fetch_events(
        &self,
        timeframe: Timeframe,
    ) -> impl Future<Output = Result<Vec<EventRecord>, FetchError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .expect("scripts lock poisoned")
            .get(&timeframe)
            .cloned();

        async move {
            let Some(script) = script else {
                return Err(FetchError::new(
                    timeframe,
                    FetchCause::InvalidResponse("no scripted response".into()),
                ));
            };
            tokio::time::sleep(script.delay).await;
            script.outcome.map_err(|message| {
                FetchError::new(timeframe, FetchCause::Api {
                    status: 503,
                    message,
                })
            })
        }
    }
}
