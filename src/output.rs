//! Output formatters for derived markers.
//!
//! Supports human-readable (with colors), JSON, and NDJSON formats.

use std::io::{self, Write};

use crate::markers::{MarkerColor, MarkerDescriptor};

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

// Depth tier colors
const RED: &str = "\x1b[91m";
const ORANGE: &str = "\x1b[38;5;208m";
const GREEN: &str = "\x1b[92m";

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable terminal output (default)
    #[default]
    Human,
    /// JSON array
    Json,
    /// Newline-delimited JSON (one object per line)
    Ndjson,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "ndjson" => Ok(Self::Ndjson),
            _ => Err(format!("unknown format: {s} (expected: human, json, ndjson)")),
        }
    }
}

fn ansi(color: MarkerColor) -> &'static str {
    match color {
        MarkerColor::Red => RED,
        MarkerColor::Orange => ORANGE,
        MarkerColor::Green => GREEN,
    }
}

/// Write markers one per line: magnitude, depth tier, radius, position, popup.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human<W: Write>(writer: &mut W, markers: &[MarkerDescriptor]) -> io::Result<()> {
    for marker in markers {
        let color = ansi(marker.fill_color);
        let mag = marker
            .magnitude
            .map_or_else(|| "?".into(), |m| format!("{m:.1}"));
        // Popup lines after the place are repeated in the columns above.
        let place = marker.popup_text.lines().next().unwrap_or_default();
        let time = marker
            .popup_text
            .lines()
            .last()
            .and_then(|l| l.strip_prefix("Time: "))
            .unwrap_or("unknown");

        writeln!(
            writer,
            "{color}●{RESET} {BOLD}M{mag:>4}{RESET} │ \
             {color}{tier:6}{RESET} │ \
             {DIM}r={radius:<4.1}{RESET} │ \
             {DIM}{depth:>5.0}km{RESET} │ \
             {lat:>7.2}, {lon:>8.2} │ \
             {time} │ {place}",
            tier = marker.fill_color.as_str(),
            radius = marker.radius,
            depth = marker.depth_km,
            lat = marker.position.lat,
            lon = marker.position.lon,
        )?;
    }
    Ok(())
}

/// Write markers as a JSON array.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(writer: &mut W, markers: &[MarkerDescriptor]) -> io::Result<()> {
    let json = serde_json::to_string_pretty(markers)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

/// Write markers as newline-delimited JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_ndjson<W: Write>(writer: &mut W, markers: &[MarkerDescriptor]) -> io::Result<()> {
    for marker in markers {
        let json = serde_json::to_string(marker)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(writer, "{json}")?;
    }
    Ok(())
}

/// Write markers in the specified format.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_markers<W: Write>(
    writer: &mut W,
    markers: &[MarkerDescriptor],
    format: Format,
) -> io::Result<()> {
    match format {
        Format::Human => write_human(writer, markers),
        Format::Json => write_json(writer, markers),
        Format::Ndjson => write_ndjson(writer, markers),
    }
}
