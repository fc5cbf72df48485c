//! Rollcall command-line shell
//!
//! Thin shell that wires configuration, logging and persistence around the
//! scan engine in `crates/`. Every command runs against an offline fixture
//! client or the stored report database.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod commands;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands, ConfigAction};
use rollcall_core::AppConfig;
use tracing::info;

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,rollcall=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Parse the command line and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Rollcall v{}", env!("CARGO_PKG_VERSION"));

    let args = Cli::parse();
    let config = AppConfig::load_with_env().context("failed to load configuration")?;

    match args.command {
        Some(Commands::Groups { fixture, limit }) => {
            commands::groups::run(&config, &fixture, limit).await
        }
        Some(Commands::Scan { fixture, group }) => {
            commands::scan::run(&config, &fixture, &group).await
        }
        Some(Commands::History) => commands::history::run(&config).await,
        Some(Commands::Export(export)) => commands::export::run(&config, &export).await,
        Some(Commands::Config { action }) => match action {
            ConfigAction::Show => commands::config::show(&config),
            ConfigAction::Init => commands::config::init(&config),
        },
        None => {
            Cli::command().print_long_help()?;
            Ok(())
        }
    }
}
