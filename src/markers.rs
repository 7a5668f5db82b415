//! Marker derivation: one event in, one renderable circle out.
//!
//! Markers are never stored. They are rebuilt from the current event set on
//! every read so the filter and the styling rules stay the single source of
//! truth.

use std::fmt::Display;

use chrono::TimeZone;
use serde::Serialize;

use crate::models::EventRecord;

/// Smallest radius a marker is drawn with.
pub const MIN_MARKER_RADIUS: f64 = 1.0;

/// Radius growth per unit of magnitude.
const RADIUS_PER_MAGNITUDE: f64 = 2.0;

/// Depth (km) below which an event counts as deep.
const DEEP_KM: f64 = 100.0;

/// Depth (km) below which an event counts as intermediate.
const INTERMEDIATE_KM: f64 = 50.0;

/// Popup timestamp layout, matching a browser's en-US `toLocaleString`.
const POPUP_TIME_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// Depth tier of a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerColor {
    Red,
    Orange,
    Green,
}

impl MarkerColor {
    /// Exact boundaries fall into the shallower tier.
    #[must_use]
    pub fn from_depth(depth_km: f64) -> Self {
        if depth_km > DEEP_KM {
            Self::Red
        } else if depth_km > INTERMEDIATE_KM {
            Self::Orange
        } else {
            Self::Green
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Green => "green",
        }
    }
}

/// Map coordinate in the order the map widget expects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lon: f64,
}

/// Rendering-ready representation of one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerDescriptor {
    pub id: String,
    pub position: LatLng,
    pub depth_km: f64,
    pub magnitude: Option<f64>,
    pub radius: f64,
    pub fill_color: MarkerColor,
    pub popup_text: String,
}

impl MarkerDescriptor {
    /// Build a marker with the popup time rendered in `tz`.
    #[must_use]
    pub fn from_record_in<Tz>(record: &EventRecord, tz: &Tz) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        Self {
            id: record.id.clone(),
            position: LatLng {
                lat: record.position.latitude,
                lon: record.position.longitude,
            },
            depth_km: record.position.depth_km,
            magnitude: record.magnitude,
            radius: record.magnitude.map_or(MIN_MARKER_RADIUS, radius_for),
            fill_color: MarkerColor::from_depth(record.position.depth_km),
            popup_text: popup_text_in(record, tz),
        }
    }
}

/// Linear in magnitude, clamped so no marker is invisible or inverted.
#[must_use]
pub fn radius_for(magnitude: f64) -> f64 {
    (magnitude * RADIUS_PER_MAGNITUDE).max(MIN_MARKER_RADIUS)
}

/// Popup lines: place, raw magnitude, depth, local time.
pub fn popup_text_in<Tz>(record: &EventRecord, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let magnitude = record
        .magnitude
        .map_or_else(|| "unknown".to_string(), |m| m.to_string());
    let time = record
        .time()
        .map(|t| t.with_timezone(tz).format(POPUP_TIME_FORMAT).to_string())
        .unwrap_or_else(|| "unknown".into());

    format!(
        "{}\nMagnitude: {magnitude}\nDepth: {} km\nTime: {time}",
        record.place, record.position.depth_km
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::filters::FilterState;
    use crate::testing::record;

    #[test]
    fn test_depth_tiers() {
        assert_eq!(MarkerColor::from_depth(150.0), MarkerColor::Red);
        assert_eq!(MarkerColor::from_depth(75.0), MarkerColor::Orange);
        assert_eq!(MarkerColor::from_depth(25.0), MarkerColor::Green);
    }

    #[test]
    fn test_depth_boundaries_take_shallower_tier() {
        assert_eq!(MarkerColor::from_depth(100.0), MarkerColor::Orange);
        assert_eq!(MarkerColor::from_depth(50.0), MarkerColor::Green);
        assert_eq!(MarkerColor::from_depth(100.001), MarkerColor::Red);
        assert_eq!(MarkerColor::from_depth(-1.2), MarkerColor::Green);
    }

    #[test]
    fn test_radius_scales_linearly() {
        assert!((radius_for(4.5) - 9.0).abs() < 1e-9);
        assert!((radius_for(1.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_radius_clamped_and_monotone() {
        let mut previous = f64::NEG_INFINITY;
        let mut m = -3.0;
        while m <= 9.0 {
            let r = radius_for(m);
            assert!(r >= MIN_MARKER_RADIUS, "radius {r} below minimum at {m}");
            assert!(r >= previous, "radius decreased at {m}");
            previous = r;
            m += 0.1;
        }
        assert!((radius_for(0.0) - MIN_MARKER_RADIUS).abs() < f64::EPSILON);
        assert!((radius_for(-0.2) - MIN_MARKER_RADIUS).abs() < f64::EPSILON);
    }

    #[test]
    fn test_popup_text() {
        let mut quake = record("ak1", Some(4.5), 75.3);
        quake.place = "42 km SW of Talkeetna, Alaska".into();
        quake.time_ms = 994_552_496_000;

        assert_eq!(
            popup_text_in(&quake, &Utc),
            "42 km SW of Talkeetna, Alaska\nMagnitude: 4.5\nDepth: 75.3 km\nTime: 7/8/2001, 12:34:56 AM"
        );
    }

    #[test]
    fn test_popup_text_unrounded_values() {
        let mut quake = record("ci1", Some(1.23), 10.0);
        quake.time_ms = 1_760_780_096_000;
        let text = popup_text_in(&quake, &Utc);
        assert!(text.contains("Magnitude: 1.23"));
        assert!(text.contains("Depth: 10 km"));
        assert!(text.ends_with("Time: 10/18/2025, 9:34:56 AM"));
    }

    #[test]
    fn test_marker_from_record() {
        let quake = record("us1", Some(4.5), 150.0);
        let marker = MarkerDescriptor::from_record_in(&quake, &Utc);

        assert_eq!(marker.id, "us1");
        assert!((marker.position.lat - quake.position.latitude).abs() < f64::EPSILON);
        assert!((marker.position.lon - quake.position.longitude).abs() < f64::EPSILON);
        assert!((marker.radius - 9.0).abs() < 1e-9);
        assert_eq!(marker.fill_color, MarkerColor::Red);
    }

    #[test]
    fn test_mock_feed_yields_two_markers() {
        let events = vec![
            record("a", Some(1.0), 10.0),
            record("b", Some(4.5), 60.0),
            record("c", Some(-0.2), 150.0),
        ];
        let filter = FilterState::default();

        let markers: Vec<_> = filter
            .visible(&events)
            .map(|e| MarkerDescriptor::from_record_in(e, &Utc))
            .collect();

        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].id, "a");
        assert_eq!(markers[0].fill_color, MarkerColor::Green);
        assert!((markers[0].radius - 2.0).abs() < 1e-9);
        assert_eq!(markers[1].id, "b");
        assert_eq!(markers[1].fill_color, MarkerColor::Orange);
        assert!((markers[1].radius - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_serialized_shape() {
        let marker = MarkerDescriptor::from_record_in(&record("x", Some(2.0), 60.0), &Utc);
        let json = serde_json::to_value(&marker).expect("serialize");
        assert_eq!(json["fill_color"], "orange");
        assert_eq!(json["radius"], 4.0);
        assert!(json["position"]["lat"].is_number());
    }
}
