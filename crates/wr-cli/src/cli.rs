//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Swim meet results from the timing console.
///
/// Reads start lists and timing-system result files, reconciles the watch
/// times and shows each heat as the scoreboard would.
#[derive(Debug, Parser)]
#[command(name = "wahoo", version, about, long_about = None)]
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
    /// Load both directories once and show the latest heat.
    Scan {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show one reconciled heat.
    Show {
        /// Event number (e.g., 12 or 1S).
        #[arg(long)]
        event: String,

        /// Heat number.
        #[arg(long)]
        heat: u32,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Parse a single start list or result file and print what was read.
    Parse {
        /// The file to parse.
        file: PathBuf,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Write the event list for the Dolphin software from the start lists.
    ExportEvents {
        /// Where to write it (default: dolphin_events.csv in the current directory).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Poll the directories and print each heat as its results arrive.
    Watch {
        /// Time between polls.
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Stop after this many polls (default: run until interrupted).
        #[arg(long)]
        iterations: Option<u32>,
    },
}
