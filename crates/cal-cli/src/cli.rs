//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Calorie logger.
///
/// Searches foods, looks up packaged products by barcode, and keeps a running
/// food log with calorie and macro totals.
#[derive(Debug, Parser)]
#[command(name = "cal", version, about, long_about = None)]
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
    /// Search the food database.
    Search {
        /// Free-text query, e.g. `cal search greek yogurt`.
        #[arg(required = true)]
        query: Vec<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Look up a packaged product by EAN-13 barcode.
    Lookup {
        /// The 13-digit barcode.
        barcode: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start an interactive logging session on stdin.
    Session,

    /// Print the resolved configuration.
    Config,
}
