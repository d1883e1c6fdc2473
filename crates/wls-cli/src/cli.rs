//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::export::ExportArgs;
use crate::commands::mapping::MappingCommand;
use crate::commands::push::PushArgs;

/// Clockify to BambooHR work log sync.
///
/// Exports Clockify time entries as BambooHR-ready JSON or pushes them
/// straight into BambooHR timesheets using stored project mappings.
#[derive(Debug, Parser)]
#[command(name = "wls", version, about, long_about = None)]
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
    /// Export Clockify entries as BambooHR-ready JSON.
    Export(ExportArgs),

    /// Create BambooHR timesheet entries from Clockify.
    Push(PushArgs),

    /// Manage Clockify to BambooHR mappings.
    #[command(subcommand)]
    Mapping(MappingCommand),

    /// Show mapping count and the last push.
    Status,
}
