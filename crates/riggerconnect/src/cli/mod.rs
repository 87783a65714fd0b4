//! Command-line interface for riggerconnect.
//!
//! This module provides the CLI structure and command handlers for the
//! `rigger` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    parse_timestamp, ActivityCommand, ActivityListCommand, ConfigCommand, FeedbackCommand,
    OutputFormat, PurgeCommand, RecipientArg, RollAddCommand, RollCommand, RollListCommand,
    RollUpdateCommand, StatusCommand,
};

/// rigger - RiggerConnect feedback and roll history tools
///
/// Routes feedback to the right RiggerConnect mailbox and keeps an
/// audit-logged history of equipment and material movements.
#[derive(Debug, Parser)]
#[command(name = "rigger")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
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
    /// Send feedback to RiggerConnect
    #[command(subcommand)]
    Feedback(FeedbackCommand),

    /// Record and browse roll history
    #[command(subcommand)]
    Roll(RollCommand),

    /// Browse or append to the activity log
    #[command(subcommand)]
    Activity(ActivityCommand),

    /// Delete old roll history and activity log rows
    Purge(PurgeCommand),

    /// Show database, outbox and monitoring status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
