//! # CLI Arguments
//!
//! Command-line argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Voicify - voice commands taught by demonstration
#[derive(Parser, Debug)]
#[command(name = "voicify")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Catalog file (overrides config)
    #[arg(long, global = true, env = "VOICIFY_CATALOG_PATH")]
    pub catalog: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List recorded commands, grouped by app
    List,

    /// Print one recorded command as JSON
    Show {
        /// App identifier, e.g. com.example.notes
        app: String,
        /// Command name
        command: String,
    },

    /// Find the command a phrase would trigger
    Match {
        /// App identifier
        app: String,
        /// Spoken phrase
        phrase: String,
    },

    /// Delete a recorded command
    Remove {
        /// App identifier
        app: String,
        /// Command name
        command: String,
    },

    /// Delete every recorded command
    Clear {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Dry-run a spoken phrase against a captured window
    Replay {
        /// Spoken phrase
        phrase: String,

        /// Window snapshot (JSON) standing in for the foreground app
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Skip pacing and settle pauses
        #[arg(long)]
        no_wait: bool,

        /// Print the replay report as JSON
        #[arg(long)]
        json: bool,
    },
}
