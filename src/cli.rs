//! Command-line interface definitions.
//!
//! Uses clap derive API for argument parsing.

use clap::{Parser, Subcommand};

use crate::client::Timeframe;
use crate::output::Format;

/// Earthquake map of the USGS feed, colored by depth and sized by magnitude.
#[derive(Parser, Debug)]
#[command(name = "quakemap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    pub quiet: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the interactive map
    Serve(ServeArgs),

    /// Fetch once and print the markers that would be drawn
    Markers(MarkersArgs),
}

/// Arguments for the `serve` command.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long, short = 'p', default_value = "8080")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Initial timeframe
    #[arg(long, default_value = "all_day", value_parser = parse_timeframe)]
    pub timeframe: Timeframe,

    /// Initial minimum magnitude
    #[arg(long, default_value = "0", allow_negative_numbers = true, value_parser = parse_min_magnitude)]
    pub min_magnitude: f64,

    /// Re-fetch the current timeframe every N seconds (minimum 30)
    #[arg(long)]
    pub auto_refresh: Option<u64>,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,
}

/// Arguments for the `markers` command.
#[derive(Parser, Debug)]
pub struct MarkersArgs {
    /// Timeframe to fetch
    #[arg(long, default_value = "all_day", value_parser = parse_timeframe)]
    pub timeframe: Timeframe,

    /// Minimum magnitude to show
    #[arg(long, default_value = "0", allow_negative_numbers = true, value_parser = parse_min_magnitude)]
    pub min_magnitude: f64,

    /// Maximum number of markers to show
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Parse a timeframe from string.
fn parse_timeframe(s: &str) -> Result<Timeframe, String> {
    s.parse()
}

/// Parse an output format from string.
fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}

/// Parse a finite magnitude threshold.
pub fn parse_min_magnitude(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("invalid magnitude: {e}"))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("magnitude must be finite, got {s}"))
    }
}
