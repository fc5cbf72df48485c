//! `history` command.

use super::open_database;
use rollcall_core::{AppConfig, ScanResult};

/// Print every stored report, most recent first.
pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let db = open_database(config).await?;
    let reports = db.list_by_recency().await?;

    if reports.is_empty() {
        println!("No stored reports");
    }
    for report in &reports {
        println!("{}", describe(report));
    }
    db.close().await;
    Ok(())
}

/// One history line: when, which group, how many phones of how many members.
#[must_use]
pub fn describe(report: &ScanResult) -> String {
    format!(
        "{}  {:<16} {:>6}/{:<6} {}",
        report.timestamp.as_datetime().format("%Y-%m-%d %H:%M"),
        report.group_id.as_str(),
        report.public_phone_count(),
        report.total_in_group,
        report.group_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rollcall_core::{GroupId, Member, MemberId, Timestamp};

    #[test]
    fn test_describe() {
        let at = Timestamp::from(Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap());
        let members = vec![
            Member::new(MemberId::from(1), "A", "", at).with_phone(Some("+1".to_string())),
            Member::new(MemberId::from(2), "B", "", at).with_phone(Some("+2".to_string())),
        ];
        let report = ScanResult::new(GroupId::from(-77), "Hikers", at, members, 120);

        let line = describe(&report);
        assert!(line.starts_with("2024-03-09 14:05  -77"));
        assert!(line.contains("2/120"));
        assert!(line.ends_with("Hikers"));
    }
}
