//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

/// Chat presence period tracker.
///
/// Converts a stream of per-user activity events into alternating online
/// and offline periods, and emits closed periods as JSONL on stdout.
#[derive(Debug, Parser)]
#[command(name = "pt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reprocess recorded events deterministically, using event timestamps
    /// as the clock.
    Replay {
        /// Input JSONL file (reads stdin when omitted).
        file: Option<PathBuf>,

        /// Seed these users into an open offline period before processing.
        #[arg(long, value_delimiter = ',')]
        seed: Vec<String>,

        /// Seed timestamp (defaults to the first event's timestamp).
        #[arg(long)]
        seed_at: Option<DateTime<Utc>>,
    },

    /// Track events live from stdin, emitting closed periods as they
    /// happen.
    Run {
        /// Seed these users into an open offline period at startup.
        #[arg(long, value_delimiter = ',')]
        seed: Vec<String>,
    },
}
