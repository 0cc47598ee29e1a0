//! Command-line interface for ghosttimer.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{
    CompassCommand, ConfigCommand, ExportCommand, OutputFormat, RecordCommand, StatusCommand,
    ViewCommand,
};

/// ghosttimer - A stopwatch that leaves a trail
///
/// Runs a stopwatch, samples your position every few seconds, and keeps the
/// samples locally so they can be viewed or exported as CSV afterwards.
#[derive(Debug, Parser)]
#[command(name = "ghosttimer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the stopwatch and record positions
    Record(RecordCommand),

    /// Show the recorded session
    View(ViewCommand),

    /// Write the recorded session to a CSV file
    Export(ExportCommand),

    /// Classify a heading into a compass direction
    Compass(CompassCommand),

    /// Show storage status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "ghosttimer");
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(parse(&["ghosttimer", "status"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["ghosttimer", "-v", "status"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["ghosttimer", "-vv", "status"]).verbosity(), Verbosity::Trace);
        assert_eq!(parse(&["ghosttimer", "-q", "-v", "status"]).verbosity(), Verbosity::Quiet);
    }

    #[test]
    fn test_parse_record() {
        let cli = parse(&["ghosttimer", "record", "--duration", "90", "--track", "drive.jsonl"]);
        let Command::Record(cmd) = cli.command else {
            panic!("expected record");
        };
        assert_eq!(cmd.duration, Some(90));
        assert_eq!(cmd.track, Some(PathBuf::from("drive.jsonl")));
        assert!(!cmd.dashboard);
    }

    #[test]
    fn test_parse_view_json() {
        let cli = parse(&["ghosttimer", "view", "--format", "json"]);
        assert!(matches!(
            cli.command,
            Command::View(ViewCommand {
                format: OutputFormat::Json
            })
        ));
    }

    #[test]
    fn test_parse_export_output() {
        let cli = parse(&["ghosttimer", "export", "-o", "/tmp/out"]);
        let Command::Export(cmd) = cli.command else {
            panic!("expected export");
        };
        assert_eq!(cmd.output, Some(PathBuf::from("/tmp/out")));
        assert!(cmd.name.is_none());
    }

    #[test]
    fn test_parse_compass_negative() {
        let cli = parse(&["ghosttimer", "compass", "-30"]);
        let Command::Compass(cmd) = cli.command else {
            panic!("expected compass");
        };
        assert!((cmd.heading + 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["ghosttimer", "-c", "/custom/config.toml", "config", "path"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
        assert!(matches!(cli.command, Command::Config(ConfigCommand::Path)));
    }
}
