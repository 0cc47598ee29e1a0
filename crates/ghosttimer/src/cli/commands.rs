//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

/// Record command arguments.
#[derive(Debug, Args)]
pub struct RecordCommand {
    /// Stop automatically after this many seconds (default: run until Ctrl-C)
    #[arg(short, long, value_name = "SECS")]
    pub duration: Option<u64>,

    /// Replay positions from a JSON-lines track file
    #[arg(short, long, value_name = "FILE")]
    pub track: Option<PathBuf>,

    /// Print every live position update
    #[arg(long)]
    pub dashboard: bool,
}

/// View command arguments.
#[derive(Debug, Args)]
pub struct ViewCommand {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Export command arguments.
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// Directory to write the CSV file to (default: from config)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// File name (default: from config)
    #[arg(short, long)]
    pub name: Option<String>,
}

/// Compass command arguments.
#[derive(Debug, Args)]
pub struct CompassCommand {
    /// Heading in degrees
    #[arg(allow_negative_numbers = true)]
    pub heading: f64,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for recorded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Aligned table
    #[default]
    Table,
    /// JSON array of records
    Json,
    /// CSV, as written by `export`
    Csv,
}
