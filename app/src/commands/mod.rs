//! Command implementations.

pub mod config;
pub mod export;
pub mod groups;
pub mod history;
pub mod scan;

use anyhow::Context;
use rollcall_client::FixtureClient;
use rollcall_core::AppConfig;
use rollcall_db::Database;
use std::path::Path;
use std::sync::Arc;

/// Open the report database named by `config`, creating it if needed.
pub async fn open_database(config: &AppConfig) -> anyhow::Result<Database> {
    let path = config
        .database_path()
        .context("failed to resolve database path")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    tracing::info!("Report database: {}", path.display());

    Database::open(&path)
        .await
        .with_context(|| format!("failed to open database {}", path.display()))
}

/// Load the fixture that stands in for the connected account.
pub fn load_client(fixture: &Path) -> anyhow::Result<Arc<FixtureClient>> {
    let client = FixtureClient::from_path(fixture)
        .with_context(|| format!("failed to load fixture {}", fixture.display()))?;
    Ok(Arc::new(client))
}
