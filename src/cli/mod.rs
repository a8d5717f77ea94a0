//! CLI Module
//!
//! Command-line interface over the voice effect engine.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// VoiceFX - apply voice effects to recorded clips
#[derive(Parser, Debug)]
#[command(name = "voicefx-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply a filter to a clip
    #[command(name = "process")]
    Process {
        /// Input clip
        input: PathBuf,

        /// Filter name (deep, robot, radio, echo, bass)
        #[arg(short, long, default_value = "passthrough")]
        filter: String,

        /// Seed for the radio noise generator
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// List filters and their parameters
    #[command(name = "filters")]
    Filters,

    /// Remove a delivered artifact
    #[command(name = "cleanup")]
    Cleanup {
        /// Path returned by `process`
        path: PathBuf,
    },

    /// Remove stale job workspaces and part files
    #[command(name = "sweep")]
    Sweep {
        /// Age in seconds after which entries are removed
        #[arg(long)]
        max_age_secs: Option<u64>,
    },

    /// Print the SHA-256 of a file
    #[command(name = "checksum")]
    Checksum {
        /// File to hash
        path: PathBuf,
    },
}
