//! CSV export of a stored report.
//!
//! Output is UTF-8 with a byte-order mark so spreadsheet tools pick the
//! right encoding for non-ASCII names.

use crate::error::Result;
use crate::filter::MemberFilter;
use rollcall_core::{ExportLocale, ScanResult};
use std::io::Write;

const BOM: &[u8] = b"\xEF\xBB\xBF";

fn headers(locale: ExportLocale) -> [&'static str; 4] {
    match locale {
        ExportLocale::English => ["Last Name", "First Name", "Phone", "Username"],
        ExportLocale::Vietnamese => ["Họ", "Tên", "Số điện thoại", "Tên người dùng"],
    }
}

/// Write the members of `result` passing `filter` as CSV.
///
/// Returns the number of data rows written.
pub fn write_csv<W: Write>(
    mut writer: W,
    result: &ScanResult,
    filter: &MemberFilter,
    locale: ExportLocale,
) -> Result<usize> {
    writer.write_all(BOM)?;

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(headers(locale))?;

    let mut rows = 0;
    for member in filter.apply(&result.members) {
        let username = member
            .username
            .as_deref()
            .map(|u| format!("@{}", u.trim_start_matches('@')))
            .unwrap_or_default();
        wtr.write_record([
            member.last_name.as_str(),
            member.first_name.as_str(),
            member.phone_number().unwrap_or_default(),
            username.as_str(),
        ])?;
        rows += 1;
    }

    wtr.flush()?;
    tracing::debug!("Exported {} members of {}", rows, result.group_id);
    Ok(rows)
}

/// File name for an export of `group_name`, with whitespace runs as `_`.
#[must_use]
pub fn file_name(group_name: &str, locale: ExportLocale) -> String {
    let prefix = match locale {
        ExportLocale::English => "members",
        ExportLocale::Vietnamese => "DANH_SACH",
    };
    let name = group_name.split_whitespace().collect::<Vec<_>>().join("_");
    let name: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    format!("{prefix}_{name}.csv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{GroupId, Member, MemberId, Timestamp};

    fn result() -> ScanResult {
        let mut active = Member::new(MemberId::from(1), "Lan", "Tran, Thi", Timestamp::now())
            .with_username(Some("lantran".to_string()))
            .with_phone(Some("+84900000001".to_string()));
        active.has_messaged = true;
        let quiet = Member::new(MemberId::from(2), "Minh", "Le", Timestamp::now())
            .with_phone(Some("+84900000002".to_string()));
        ScanResult::new(GroupId::from(-9), "Hội phụ huynh", Timestamp::now(), vec![active, quiet], 5)
    }

    fn export(filter: &MemberFilter, locale: ExportLocale) -> (usize, String) {
        let mut buf = Vec::new();
        let rows = write_csv(&mut buf, &result(), filter, locale).expect("export");
        assert!(buf.starts_with(BOM));
        (rows, String::from_utf8(buf[BOM.len()..].to_vec()).expect("utf-8"))
    }

    #[test]
    fn test_english_export() {
        let (rows, text) = export(&MemberFilter::new(), ExportLocale::English);
        assert_eq!(rows, 2);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Last Name,First Name,Phone,Username");
        assert_eq!(lines[1], "\"Tran, Thi\",Lan,+84900000001,@lantran");
        assert_eq!(lines[2], "Le,Minh,+84900000002,");
    }

    #[test]
    fn test_vietnamese_headers() {
        let (_, text) = export(&MemberFilter::new(), ExportLocale::Vietnamese);
        assert!(text.starts_with("Họ,Tên,Số điện thoại,"));
    }

    #[test]
    fn test_filter_applies() {
        let (rows, text) = export(&MemberFilter::new().active_only(), ExportLocale::English);
        assert_eq!(rows, 1);
        assert!(!text.contains("Minh"));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name("Hội  phụ huynh", ExportLocale::English),
            "members_Hội_phụ_huynh.csv"
        );
        assert_eq!(
            file_name("A/B club", ExportLocale::Vietnamese),
            "DANH_SACH_A_B_club.csv"
        );
    }
}
