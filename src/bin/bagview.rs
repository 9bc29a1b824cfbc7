// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Bagview CLI
//!
//! Thin command-line front end over the bagview library.
//!
//! ## Usage
//!
//! ```sh
//! # Show file information
//! bagview info drive.bag
//!
//! # List topics
//! bagview topics drive.bag --counts
//!
//! # Print messages in time order
//! bagview cat drive.bag --topics /imu,/odom --start 10.5 --limit 100
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};

use bagview::{BagReader, TopicFilter};

type Result<T = ()> = anyhow::Result<T>;

/// Bagview - ROS1 bag inspection tool
///
/// Read-only views over bag files: metadata, topics, and time-ordered
/// message listings.
#[derive(Parser)]
#[command(name = "bagview")]
#[command(about = "Zero-copy ROS1 bag reader", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Show basic file information and summary
    Info {
        /// Input bag file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// List all topics in the file
    Topics {
        /// Input bag file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Show per-topic message counts
        #[arg(long)]
        counts: bool,
    },

    /// Print messages in timestamp order
    Cat {
        /// Input bag file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Comma-separated topic names to include
        #[arg(short, long, value_delimiter = ',')]
        topics: Vec<String>,

        /// Start time (seconds, nanoseconds, or ISO 8601), inclusive
        #[arg(long)]
        start: Option<String>,

        /// End time (seconds, nanoseconds, or ISO 8601), exclusive
        #[arg(long)]
        end: Option<String>,

        /// Stop after this many messages
        #[arg(short, long)]
        limit: Option<u64>,
    },
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input } => cmd_info(input),
        Commands::Topics { input, counts } => cmd_topics(input, counts),
        Commands::Cat {
            input,
            topics,
            start,
            end,
            limit,
        } => cmd_cat(input, topics, start, end, limit),
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Cmd: Show file info
fn cmd_info(input: PathBuf) -> Result<()> {
    let bag = BagReader::open(&input)?;

    println!("=== {} ===", input.display());
    println!("Version: {}", bag.version());
    println!("Size: {} bytes", bag.file_size());
    println!("Chunks: {}", bag.chunk_count());
    println!("Connections: {}", bag.connections().count());
    println!("Messages: {}", bag.message_count());

    if let (Some(start), Some(end)) = (bag.start_time(), bag.end_time()) {
        println!("Start: {}", format_timestamp(start));
        println!("End: {}", format_timestamp(end));
        println!("Duration: {}", format_duration(bag.duration()));
    }

    println!();
    println!("Connections:");
    for conn in bag.connections() {
        println!("  [{}] {} | {}", conn.id, conn.topic, conn.datatype);
    }

    Ok(())
}

/// Cmd: List topics
fn cmd_topics(input: PathBuf, counts: bool) -> Result<()> {
    let bag = BagReader::open(&input)?;

    if !counts {
        for topic in bag.topics() {
            println!("{topic}");
        }
        return Ok(());
    }

    // Counting means iterating the topic's view.
    for topic in bag.topics() {
        let view = bag.view().with_topics([topic]);
        let count = view.messages().count();
        println!("{topic}: {count}");
    }

    Ok(())
}

/// Cmd: Print messages
fn cmd_cat(
    input: PathBuf,
    topics: Vec<String>,
    start: Option<String>,
    end: Option<String>,
    limit: Option<u64>,
) -> Result<()> {
    let bag = BagReader::open(&input)?;

    let mut view = bag.view();
    if !topics.is_empty() {
        view.set_filter(TopicFilter::include(topics));
    }
    if let Some(s) = start {
        view.set_start_time(parse_timestamp(&s)?);
    }
    if let Some(e) = end {
        view.set_end_time(parse_timestamp(&e)?);
    }

    let limit = limit.unwrap_or(u64::MAX);
    let mut printed = 0u64;
    for msg in &view {
        if printed >= limit {
            break;
        }
        println!(
            "{} {} {} ({} bytes)",
            msg.stamp,
            msg.topic(),
            msg.datatype(),
            msg.len()
        );
        printed += 1;
    }

    let stats = bag.stats();
    if stats.messages_skipped > 0 {
        eprintln!("warning: {} unreadable messages skipped", stats.messages_skipped);
    }

    Ok(())
}

/// Format a duration in nanoseconds to a human-readable string.
fn format_duration(nanos: u64) -> String {
    let secs = nanos / 1_000_000_000;
    let millis = (nanos % 1_000_000_000) / 1_000_000;

    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{secs}.{millis:03}s")
    } else {
        format!("{millis}ms")
    }
}

/// Format a timestamp in nanoseconds to a human-readable string.
fn format_timestamp(nanos: u64) -> String {
    let secs = nanos / 1_000_000_000;
    match chrono::DateTime::<chrono::Utc>::from_timestamp(secs as i64, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("{nanos} ns"),
    }
}

/// Parse a timestamp argument to nanoseconds.
///
/// Accepts unix seconds ("1234567890" or "10.5"), unix nanoseconds, or
/// ISO 8601 ("2023-01-01T00:00:00Z").
fn parse_timestamp(s: &str) -> Result<u64> {
    if let Ok(n) = s.parse::<u64>() {
        // Small values are seconds, anything past year 3000 nanoseconds.
        return Ok(if n < 32_503_680_000 {
            n * 1_000_000_000
        } else {
            n
        });
    }

    if let Ok(secs) = s.parse::<f64>() {
        if secs >= 0.0 {
            return Ok((secs * 1e9) as u64);
        }
    }

    let dt = chrono::DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid timestamp: {s}"))?;
    Ok(dt.timestamp_nanos_opt().unwrap_or(0) as u64)
}
