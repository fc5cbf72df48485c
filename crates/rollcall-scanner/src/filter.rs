//! Display filter over stored members.

use chrono::{DateTime, Duration, Utc};
use rollcall_core::Member;

/// Predicate used by the results view and by exports.
///
/// All enabled criteria must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberFilter {
    search: Option<String>,
    joined_within: Option<Duration>,
    active_only: bool,
}

impl MemberFilter {
    /// Filter that keeps every member.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep members whose username or names contain `term` (ignoring case)
    /// or whose phone contains it. A blank term disables the search.
    #[must_use]
    pub fn search(mut self, term: impl Into<String>) -> Self {
        let term = term.into().trim().to_lowercase();
        self.search = (!term.is_empty()).then_some(term);
        self
    }

    /// Keep members who joined within the last `days` days.
    #[must_use]
    pub fn recently_joined(mut self, days: u32) -> Self {
        self.joined_within = Some(Duration::days(i64::from(days)));
        self
    }

    /// Keep members who posted or reacted in the group.
    #[must_use]
    pub fn active_only(mut self) -> Self {
        self.active_only = true;
        self
    }

    /// Whether `member` passes, judging join dates against `now`.
    #[must_use]
    pub fn matches_at(&self, member: &Member, now: DateTime<Utc>) -> bool {
        if let Some(term) = &self.search {
            let in_text = [
                member.username.as_deref().unwrap_or_default(),
                member.first_name.as_str(),
                member.last_name.as_str(),
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(term.as_str()));
            let in_phone = member.phone_number().is_some_and(|p| p.contains(term.as_str()));
            if !in_text && !in_phone {
                return false;
            }
        }

        // A window reaching before the earliest representable date has no
        // lower bound.
        if let Some(cutoff) = self.joined_within.and_then(|w| now.checked_sub_signed(w)) {
            if *member.join_date.as_datetime() <= cutoff {
                return false;
            }
        }

        !self.active_only || member.has_messaged || member.has_reacted
    }

    /// Whether `member` passes right now.
    #[must_use]
    pub fn matches(&self, member: &Member) -> bool {
        self.matches_at(member, Utc::now())
    }

    /// Members passing the filter, in their original order.
    #[must_use]
    pub fn apply<'a>(&self, members: &'a [Member]) -> Vec<&'a Member> {
        let now = Utc::now();
        members.iter().filter(|m| self.matches_at(m, now)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{MemberId, Timestamp};

    fn member(id: i64, first: &str, days_ago: i64, now: DateTime<Utc>) -> Member {
        Member::new(
            MemberId::from(id),
            first,
            "Nguyen",
            Timestamp::from(now - Duration::days(days_ago)),
        )
    }

    #[test]
    fn test_default_keeps_everyone() {
        let now = Utc::now();
        assert!(MemberFilter::new().matches_at(&member(1, "An", 400, now), now));
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let now = Utc::now();
        let m = member(1, "Anh", 1, now)
            .with_username(Some("AnhTran".to_string()))
            .with_phone(Some("+84912345678".to_string()));

        assert!(MemberFilter::new().search("anhtran").matches_at(&m, now));
        assert!(MemberFilter::new().search("NGUYEN").matches_at(&m, now));
        assert!(MemberFilter::new().search("912345").matches_at(&m, now));
        assert!(!MemberFilter::new().search("binh").matches_at(&m, now));
        assert!(MemberFilter::new().search("   ").matches_at(&m, now));
    }

    #[test]
    fn test_recently_joined_window() {
        let now = Utc::now();
        let filter = MemberFilter::new().recently_joined(60);
        assert!(filter.matches_at(&member(1, "New", 10, now), now));
        assert!(!filter.matches_at(&member(2, "Old", 90, now), now));
    }

    #[test]
    fn test_huge_recent_window_keeps_everyone() {
        let now = Utc::now();
        let filter = MemberFilter::new().recently_joined(u32::MAX);
        assert!(filter.matches_at(&member(1, "Old", 40_000, now), now));
        assert!(filter.matches(&member(2, "New", 0, now)));
    }

    #[test]
    fn test_active_only() {
        let now = Utc::now();
        let quiet = member(1, "Quiet", 1, now);
        let mut chatty = member(2, "Chatty", 1, now);
        chatty.has_messaged = true;
        let mut reacting = member(3, "Reacting", 1, now);
        reacting.has_reacted = true;

        let filter = MemberFilter::new().active_only();
        assert!(!filter.matches_at(&quiet, now));
        assert!(filter.matches_at(&chatty, now));
        assert!(filter.matches_at(&reacting, now));
    }

    #[test]
    fn test_apply_keeps_order() {
        let now = Utc::now();
        let members = vec![
            member(1, "Binh", 1, now),
            member(2, "An", 1, now),
            member(3, "Bao", 1, now),
        ];
        let kept = MemberFilter::new().search("b").apply(&members);
        let ids: Vec<&str> = kept.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }
}
