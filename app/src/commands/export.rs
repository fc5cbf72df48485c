//! `export` command.

use super::open_database;
use crate::cli::ExportArgs;
use anyhow::Context;
use rollcall_core::{AppConfig, ExportConfig, GroupId};
use rollcall_scanner::{file_name, write_csv, MemberFilter, ResultStore};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

/// Export the stored report of one group as CSV.
pub async fn run(config: &AppConfig, args: &ExportArgs) -> anyhow::Result<()> {
    let db = open_database(config).await?;
    let (path, rows) = export_report(&db, args, &config.export).await?;
    println!("Wrote {rows} members to {}", path.display());
    db.close().await;
    Ok(())
}

/// Filter selected by the command-line options.
#[must_use]
pub fn filter_for(args: &ExportArgs, defaults: &ExportConfig) -> MemberFilter {
    let mut filter = MemberFilter::new();
    if let Some(term) = &args.search {
        filter = filter.search(term.as_str());
    }
    if let Some(days) = args.recent_days {
        filter = filter.recently_joined(days);
    } else if args.recent {
        filter = filter.recently_joined(defaults.recent_days);
    }
    if args.active {
        filter = filter.active_only();
    }
    filter
}

/// Write the report of `args.group` into `args.out`.
///
/// Returns the written file and the number of member rows.
pub async fn export_report(
    store: &dyn ResultStore,
    args: &ExportArgs,
    defaults: &ExportConfig,
) -> anyhow::Result<(PathBuf, usize)> {
    let group_id = GroupId::new(args.group.as_str())?;
    let report = store
        .get(&group_id)
        .await?
        .with_context(|| format!("no stored report for group {group_id}"))?;

    let locale = args.locale.unwrap_or(defaults.locale);
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create {}", args.out.display()))?;
    let path = args.out.join(file_name(&report.group_name, locale));
    let file =
        File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;

    let rows = write_csv(BufWriter::new(file), &report, &filter_for(args, defaults), locale)?;
    tracing::info!("Exported {} of {} members to {}", rows, report.members.len(), path.display());
    Ok((path, rows))
}
