//! `groups` command.

use super::load_client;
use rollcall_client::{GroupEntity, GroupKind};
use rollcall_core::AppConfig;
use rollcall_scanner::{MemoryResultStore, ScanOrchestrator};
use std::path::Path;
use std::sync::Arc;

/// Print the groups visible to the fixture account.
pub async fn run(config: &AppConfig, fixture: &Path, limit: usize) -> anyhow::Result<()> {
    let client = load_client(fixture)?;
    // Listing never persists anything.
    let orchestrator = ScanOrchestrator::new(
        client,
        Arc::new(MemoryResultStore::new()),
        config.scanning.clone(),
    );

    let groups = orchestrator.list_groups(limit).await?;
    if groups.is_empty() {
        println!("No groups found");
    }
    for group in &groups {
        println!("{}", describe(group));
    }
    Ok(())
}

fn kind_label(kind: GroupKind) -> &'static str {
    match kind {
        GroupKind::BasicGroup => "group",
        GroupKind::Supergroup => "supergroup",
        GroupKind::Channel => "channel",
    }
}

fn describe(group: &GroupEntity) -> String {
    let members = group
        .participants_count
        .map_or_else(|| "?".to_string(), |n| n.to_string());
    format!(
        "{:<16} {:<12} {:>8} members  {}",
        group.id.as_str(),
        kind_label(group.kind),
        members,
        group.title
    )
}
