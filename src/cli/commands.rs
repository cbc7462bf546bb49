//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - parse: estimate nutrition for a new meal
//! - refine: apply a modification to an existing record
//! - handle: answer one JSON request envelope

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// macrolog - turn meal descriptions into nutrition records
#[derive(Parser, Debug)]
#[command(name = "macrolog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Estimate nutrition for a new meal
    Parse {
        /// Meal description, e.g. "2 eggs and a slice of toast"
        #[arg(required = true, num_args = 1..)]
        description: Vec<String>,

        /// Print the record as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Apply a modification to an existing record
    Refine {
        /// Record JSON file to modify ("-" reads stdin)
        #[arg(short, long)]
        record: PathBuf,

        /// Modification, e.g. "double it" or "remove the toast"
        #[arg(required = true, num_args = 1..)]
        instruction: Vec<String>,

        /// Print the record as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Answer one request envelope and print the response envelope
    Handle {
        /// Request JSON file (reads stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

/// Join free-text words passed as separate arguments
pub fn join_words(words: &[String]) -> String {
    words.join(" ")
}
