//! `scan` command.

use super::{load_client, open_database};
use rollcall_core::AppConfig;
use rollcall_scanner::{ScanOrchestrator, ScanOutcome, ScanState, ScanStatus, ScanTarget};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Scan `group` of the fixture account and merge the result into history.
///
/// Ctrl-C stops the scan cooperatively; whatever was found is still stored.
pub async fn run(config: &AppConfig, fixture: &Path, group: &str) -> anyhow::Result<()> {
    let client = load_client(fixture)?;
    let db = Arc::new(open_database(config).await?);
    let orchestrator = ScanOrchestrator::new(client, db.clone(), config.scanning.clone());

    let mut progress = orchestrator.subscribe();
    let reporter = tokio::spawn(async move {
        let mut last_state = ScanState::Idle;
        while progress.changed().await.is_ok() {
            let snapshot = *progress.borrow_and_update();
            if snapshot.state != last_state {
                info!("Scan state: {}", snapshot.state);
                last_state = snapshot.state;
            }
            debug!(
                "{}/{} processed, {} with public phone",
                snapshot.progress, snapshot.target, snapshot.found
            );
        }
    });

    let cancel = orchestrator.cancel_flag();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the current request before stopping");
            cancel.cancel();
        }
    });

    let outcome = orchestrator.scan(&ScanTarget::handle(group)).await;
    interrupt.abort();
    drop(orchestrator);
    let _ = reporter.await;

    let outcome = outcome?;
    print!("{}", summary(&outcome));
    if let Ok(db) = Arc::try_unwrap(db) {
        db.close().await;
    }

    match outcome.error {
        Some(e) if outcome.status == ScanStatus::Failed => Err(e.into()),
        _ => Ok(()),
    }
}

/// Human-readable report of a finished scan.
#[must_use]
pub fn summary(outcome: &ScanOutcome) -> String {
    let stats = &outcome.stats;
    let mut lines = vec![
        format!("Scan {:?}", outcome.status),
        format!(
            "  roster: {} members, {} inspected, {} already known, {} lookups failed",
            stats.roster_size, stats.inspected, stats.skipped_known, stats.lookup_failures
        ),
        format!(
            "  found this run: {}, flood waits: {}",
            outcome.found(),
            stats.flood_waits
        ),
    ];
    if let Some(result) = &outcome.result {
        lines.push(format!(
            "  report {} ({}): {} members with public phone of {}",
            result.group_id,
            result.group_name,
            result.members.len(),
            result.total_in_group
        ));
    }
    if let Some(error) = &outcome.error {
        lines.push(format!("  error: {error}"));
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}
