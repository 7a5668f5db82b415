//! quakemap - Live earthquake map of the USGS feed.
//!
//! Markers are colored by depth and sized by magnitude, filtered by recency
//! window and minimum magnitude. The map is served as a single page; the
//! `markers` command prints the same markers for scripting.

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

mod cli;
mod client;
mod errors;
mod filters;
mod markers;
mod models;
mod output;
mod server;
mod session;
#[cfg(test)]
mod testing;
mod view_model;

use cli::{Cli, Command};
use client::{FeedSource, UsgsClient};
use filters::FilterState;
use view_model::ViewModel;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Markers(args) => cmd_markers(args),
    }
}

/// Initialize tracing subscriber.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the `markers` command - one fetch, markers to stdout.
fn cmd_markers(args: cli::MarkersArgs) -> Result<()> {
    let mut view = ViewModel::new(FilterState {
        timeframe: args.timeframe,
        min_magnitude: args.min_magnitude,
    });
    let ticket = view.refresh();

    let client = UsgsClient::new().context("failed to create USGS client")?;
    let events = tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(client.fetch_events(ticket.timeframe()))
        .context("failed to fetch earthquake feed")?;
    view.apply(ticket, Ok(events));

    let mut markers = view.markers();
    if let Some(limit) = args.limit {
        markers.truncate(limit);
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_markers(&mut handle, &markers, args.format)?;

    Ok(())
}

/// Execute the `serve` command - start the map server.
fn cmd_serve(args: cli::ServeArgs) -> Result<()> {
    let config = server::ServerConfig {
        port: args.port,
        host: args.host.clone(),
        filter: FilterState {
            timeframe: args.timeframe,
            min_magnitude: args.min_magnitude,
        },
        auto_refresh: args.auto_refresh,
    };

    if let Some(secs) = args.auto_refresh {
        if secs < server::MIN_AUTO_REFRESH_SECS {
            tracing::warn!(
                "auto-refresh clamped to minimum of {} seconds",
                server::MIN_AUTO_REFRESH_SECS
            );
        }
    }

    // Print startup message
    let url = format!("http://{}:{}", args.host, args.port);
    println!("\x1b[1m🌍 quakemap\x1b[0m");
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("  Local:     \x1b[96m{url}\x1b[0m");
    println!("  Timeframe: {}", args.timeframe);
    println!("  Min mag:   {}", args.min_magnitude);
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("\x1b[2mPress Ctrl+C to stop\x1b[0m\n");

    // Open browser if requested (using xdg-open/open command)
    if args.open {
        #[cfg(target_os = "linux")]
        let _ = std::process::Command::new("xdg-open").arg(&url).spawn();
        #[cfg(target_os = "macos")]
        let _ = std::process::Command::new("open").arg(&url).spawn();
        #[cfg(target_os = "windows")]
        let _ = std::process::Command::new("cmd").args(["/c", "start", &url]).spawn();
    }

    // Run the async server on tokio runtime
    tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(server::run_server(config))
}
