//! Data models for the USGS GeoJSON summary feed.
//!
//! The wire structures are deliberately lenient: every feature is decoded on
//! its own so one malformed record never sinks the whole batch.

use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::FetchCause;

/// Label used when a feature carries no place description.
pub const UNKNOWN_PLACE: &str = "Unknown location";

/// Top-level GeoJSON response from USGS feeds.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureCollection {
    /// Always "FeatureCollection"
    #[serde(rename = "type")]
    pub type_: String,

    /// Feed metadata
    #[serde(default)]
    pub metadata: Option<Metadata>,

    /// Raw features, decoded one at a time by [`parse_feed`]
    pub features: Vec<serde_json::Value>,
}

impl FeatureCollection {
    /// Validate the response structure.
    pub fn validate(&self) -> Result<(), FetchCause> {
        if self.type_ != "FeatureCollection" {
            return Err(FetchCause::InvalidResponse(format!(
                "expected type 'FeatureCollection', got '{}'",
                self.type_
            )));
        }
        Ok(())
    }
}

/// Metadata about the feed response.
#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    /// When this feed was generated (ms since epoch)
    pub generated: Option<i64>,

    /// Human-readable title
    pub title: Option<String>,

    /// Number of events in response
    pub count: Option<usize>,
}

/// A single feature as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    pub id: Option<String>,
    pub geometry: Option<Geometry>,
    pub properties: Properties,
}

/// Geographic geometry for an event.
#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    /// Coordinates: [longitude, latitude, depth_km]
    pub coordinates: Vec<f64>,
}

/// The subset of event properties the map needs.
#[derive(Debug, Clone, Deserialize)]
pub struct Properties {
    /// Magnitude value, occasionally null
    pub mag: Option<f64>,

    /// Human-readable place description
    pub place: Option<String>,

    /// Event time (ms since epoch)
    pub time: Option<i64>,
}

/// Event location. Depth is in kilometers, positive down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub longitude: f64,
    pub latitude: f64,
    pub depth_km: f64,
}

/// One normalized seismic event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub id: String,
    pub position: Position,
    pub magnitude: Option<f64>,
    pub place: String,
    pub time_ms: i64,
}

impl EventRecord {
    /// Get the event time as a `DateTime<Utc>`.
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.time_ms).single()
    }
}

impl TryFrom<Feature> for EventRecord {
    type Error = String;

    fn try_from(feature: Feature) -> Result<Self, Self::Error> {
        let id = feature
            .id
            .filter(|id| !id.is_empty())
            .ok_or("missing event ID")?;

        let coordinates = feature
            .geometry
            .map(|g| g.coordinates)
            .unwrap_or_default();
        let [longitude, latitude, depth_km, ..] = coordinates[..] else {
            return Err(format!(
                "{id}: expected 3 coordinates, got {}",
                coordinates.len()
            ));
        };

        let time_ms = feature
            .properties
            .time
            .ok_or_else(|| format!("{id}: missing event time"))?;

        Ok(Self {
            id,
            position: Position {
                longitude,
                latitude,
                depth_km,
            },
            magnitude: feature.properties.mag,
            place: feature
                .properties
                .place
                .unwrap_or_else(|| UNKNOWN_PLACE.to_string()),
            time_ms,
        })
    }
}

/// Parse a feed body into event records.
///
/// Fails only when the body as a whole is unusable. Individual features that
/// cannot be normalized are skipped, as are repeated IDs within the batch.
///
/// # Errors
///
/// Returns [`FetchCause::Parse`] for malformed JSON and
/// [`FetchCause::InvalidResponse`] for a body that is not a feature collection.
pub fn parse_feed(body: &str) -> Result<Vec<EventRecord>, FetchCause> {
    let collection: FeatureCollection = serde_json::from_str(body)?;
    collection.validate()?;

    if let Some(meta) = &collection.metadata {
        debug!(
            title = meta.title.as_deref().unwrap_or("?"),
            generated = meta.generated,
            count = meta.count,
            "feed metadata"
        );
    }

    let mut seen = HashSet::with_capacity(collection.features.len());
    let mut records = Vec::with_capacity(collection.features.len());
    let mut skipped = 0usize;

    for raw in collection.features {
        let record = serde_json::from_value::<Feature>(raw)
            .map_err(|e| e.to_string())
            .and_then(EventRecord::try_from);

        match record {
            Ok(record) if seen.insert(record.id.clone()) => records.push(record),
            Ok(record) => {
                skipped += 1;
                warn!("dropping duplicate event {} in batch", record.id);
            }
            Err(reason) => {
                skipped += 1;
                warn!("skipping malformed feature: {reason}");
            }
        }
    }

    debug!("parsed {} events ({} skipped)", records.len(), skipped);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = include_str!("../tools/sample_all_day.geojson");

    #[test]
    fn test_parse_sample_feed() {
        let records = parse_feed(SAMPLE).expect("failed to parse sample feed");

        // 7 features: one without coordinates, one without an ID and one
        // duplicate are dropped.
        assert_eq!(records.len(), 4);

        let first = &records[0];
        assert_eq!(first.id, "ak0251a2b3c4");
        assert_eq!(first.magnitude, Some(1.8));
        assert_eq!(first.place, "42 km SW of Talkeetna, Alaska");
        assert!((first.position.longitude - (-150.5213)).abs() < 1e-9);
        assert!((first.position.latitude - 62.0101).abs() < 1e-9);
        assert!((first.position.depth_km - 75.3).abs() < 1e-9);
        assert_eq!(first.time_ms, 1_760_780_096_000);
    }

    #[test]
    fn test_null_magnitude_is_kept() {
        let records = parse_feed(SAMPLE).expect("failed to parse sample feed");
        let quiet = records
            .iter()
            .find(|r| r.id == "nc75123456")
            .expect("null-magnitude record missing");
        assert_eq!(quiet.magnitude, None);
        assert_eq!(quiet.place, UNKNOWN_PLACE);
    }

    #[test]
    fn test_first_duplicate_wins() {
        let records = parse_feed(SAMPLE).expect("failed to parse sample feed");
        let dupes: Vec<_> = records.iter().filter(|r| r.id == "us7000abcd").collect();
        assert_eq!(dupes.len(), 1);
        assert_eq!(dupes[0].magnitude, Some(4.6));
    }

    #[test]
    fn test_wrong_collection_type() {
        let body = r#"{"type": "Feature", "features": []}"#;
        assert!(matches!(
            parse_feed(body),
            Err(FetchCause::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_malformed_body() {
        assert!(matches!(parse_feed("<html>"), Err(FetchCause::Parse(_))));
    }

    #[test]
    fn test_badly_typed_feature_is_skipped() {
        let body = r#"{
            "type": "FeatureCollection",
            "features": [
                {"id": "a", "geometry": {"coordinates": "nope"}, "properties": {"mag": 1.0, "time": 1}},
                {"id": "b", "geometry": {"coordinates": [1.0, 2.0, 3.0]}, "properties": {"mag": "big", "time": 1}},
                {"id": "c", "geometry": {"coordinates": [1.0, 2.0, 3.0]}, "properties": {"mag": 2.0, "place": "x", "time": 5}}
            ]
        }"#;
        let records = parse_feed(body).expect("batch should survive bad features");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "c");
        assert_eq!(records[0].time().map(|t| t.timestamp_millis()), Some(5));
    }
}
