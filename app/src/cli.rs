//! Command-line definition.

use clap::{Args, Parser, Subcommand};
use rollcall_core::ExportLocale;
use std::path::PathBuf;

/// Top-level arguments.
#[derive(Debug, Parser)]
#[command(name = "rollcall")]
#[command(about = "Scan group membership and collect public phone numbers", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to run; prints help when absent
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the groups and channels visible to the account
    Groups {
        /// JSON fixture standing in for the connected account
        #[arg(long)]
        fixture: PathBuf,
        /// Maximum number of groups to list
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Scan one group and merge the results into its stored report
    Scan {
        /// JSON fixture standing in for the connected account
        #[arg(long)]
        fixture: PathBuf,
        /// Group id or public handle
        #[arg(long, allow_hyphen_values = true)]
        group: String,
    },
    /// List stored reports, most recent first
    History,
    /// Write a stored report to a CSV file
    Export(ExportArgs),
    /// Show or create the configuration file
    Config {
        /// What to do with the configuration
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options of the `export` command.
#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    /// Id of the group whose report is exported
    #[arg(long, allow_hyphen_values = true)]
    pub group: String,
    /// Keep members whose name, username or phone contains this text
    #[arg(long)]
    pub search: Option<String>,
    /// Keep members who joined within the configured recent window
    #[arg(long)]
    pub recent: bool,
    /// Keep members who joined within this many days
    #[arg(long, value_name = "DAYS", conflicts_with = "recent")]
    pub recent_days: Option<u32>,
    /// Keep members who posted or reacted
    #[arg(long)]
    pub active: bool,
    /// Directory the CSV file is written to
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
    /// Header language (`en` or `vi`); defaults to the configured locale
    #[arg(long)]
    pub locale: Option<ExportLocale>,
}

/// `config` subcommands.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Write the effective configuration to the config file
    Init,
}
