//! Stage two: per-member profile lookups.

use crate::error::{Result, ScanError};
use crate::requester::RateLimitedRequester;
use rollcall_client::{FullUser, PlatformClient, RawMember};
use rollcall_core::{Member, Timestamp};
use std::sync::Arc;
use std::time::Duration;

/// Resolves the phone number of one roster entry at a time.
pub struct ProfileInspector {
    client: Arc<dyn PlatformClient>,
    requester: Arc<RateLimitedRequester>,
    base_delay: Duration,
}

impl ProfileInspector {
    /// Create an inspector pausing `base_delay` (scaled by roster size)
    /// between members.
    #[must_use]
    pub fn new(
        client: Arc<dyn PlatformClient>,
        requester: Arc<RateLimitedRequester>,
        base_delay: Duration,
    ) -> Self {
        Self {
            client,
            requester,
            base_delay,
        }
    }

    /// Build a member record for `raw`, looking up its profile if needed.
    ///
    /// A phone embedded in the roster entry is used as is and no call is
    /// made. Flood signals are waited out by the requester; any other
    /// failure is returned as [`ScanError::LookupFailed`] for this member
    /// alone.
    pub async fn inspect(&self, raw: &RawMember) -> Result<Member> {
        if raw.phone.as_deref().is_some_and(|p| !p.trim().is_empty()) {
            tracing::debug!("Member {} carries a phone in the roster entry", raw.id);
            return Ok(member_from_raw(raw, None));
        }

        let client = &self.client;
        let lookup = async {
            let input = self
                .requester
                .execute("resolve user", || client.resolve_input_user(raw))
                .await?;
            self.requester
                .execute("full user", || client.get_full_user(&input))
                .await
        };

        match lookup.await {
            Ok(full) => Ok(member_from_raw(raw, Some(&full))),
            Err(source) => Err(ScanError::LookupFailed {
                member_id: raw.id.clone(),
                source,
            }),
        }
    }

    /// Pause between two members of a roster of `roster_size`.
    ///
    /// Longer rosters get longer pauses: 1x the base delay up to 200
    /// members, 2x up to 1 000, 4x up to 5 000 and 6x beyond.
    #[must_use]
    pub fn pacing_delay(&self, roster_size: usize) -> Duration {
        let factor = match roster_size {
            0..=200 => 1,
            201..=1_000 => 2,
            1_001..=5_000 => 4,
            _ => 6,
        };
        self.base_delay * factor
    }

    /// Sleep for [`pacing_delay`](Self::pacing_delay).
    pub async fn pace(&self, roster_size: usize) {
        let delay = self.pacing_delay(roster_size);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn member_from_raw(raw: &RawMember, full: Option<&FullUser>) -> Member {
    let join_date = raw.joined_at.map_or_else(Timestamp::now, Timestamp::from);

    let Some(full) = full else {
        return Member::new(raw.id.clone(), &raw.first_name, &raw.last_name, join_date)
            .with_username(raw.username.clone())
            .with_phone(raw.phone.clone());
    };

    let (first_name, last_name) = if full.first_name.is_empty() && full.last_name.is_empty() {
        (raw.first_name.as_str(), raw.last_name.as_str())
    } else {
        (full.first_name.as_str(), full.last_name.as_str())
    };

    Member::new(raw.id.clone(), first_name, last_name, join_date)
        .with_username(full.username.clone().or_else(|| raw.username.clone()))
        .with_phone(full.phone.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_client::{CallKind, FixtureClient};
    use rollcall_core::MemberId;

    const FIXTURE: &str = r#"{
        "groups": [
            { "id": "-5", "title": "Club", "kind": "supergroup",
              "members": [
                { "id": "1", "first_name": "An", "username": "an_t" },
                { "id": "2", "first_name": "Binh", "phone": "+84900000002" },
                { "id": "3", "first_name": "Chi", "joined_at": "2024-01-02T03:04:05Z" },
                { "id": "4", "first_name": "Dung" },
                { "id": "5", "first_name": "Em" }
              ] }
        ],
        "profiles": {
            "1": { "phone": "+84900000001" },
            "3": {},
            "4": { "error": "USER_PRIVACY_RESTRICTED" },
            "5": { "error": "PEER_FLOOD" }
        }
    }"#;

    fn setup() -> (Arc<FixtureClient>, ProfileInspector) {
        let client = Arc::new(FixtureClient::from_json(FIXTURE).expect("fixture"));
        let inspector = ProfileInspector::new(
            Arc::clone(&client) as Arc<dyn PlatformClient>,
            Arc::new(RateLimitedRequester::new(Duration::from_secs(1), Duration::from_secs(30))),
            Duration::from_millis(500),
        );
        (client, inspector)
    }

    fn raw(id: i64, first: &str) -> RawMember {
        RawMember::new(MemberId::from(id), first, "")
    }

    #[tokio::test]
    async fn test_public_phone_is_resolved() {
        let (_client, inspector) = setup();
        let mut entry = raw(1, "An");
        entry.username = Some("an_t".to_string());

        let member = inspector.inspect(&entry).await.expect("lookup");
        assert!(member.is_public_phone());
        assert_eq!(member.phone_number(), Some("+84900000001"));
        assert_eq!(member.username.as_deref(), Some("an_t"));
    }

    #[tokio::test]
    async fn test_embedded_phone_skips_lookup() {
        let (client, inspector) = setup();
        let mut entry = raw(2, "Binh");
        entry.phone = Some("+84900000002".to_string());

        let member = inspector.inspect(&entry).await.expect("embedded");
        assert_eq!(member.phone_number(), Some("+84900000002"));
        assert!(client.calls_of(CallKind::ResolveUser).is_empty());
        assert!(client.calls_of(CallKind::FullUser).is_empty());
    }

    #[tokio::test]
    async fn test_hidden_phone_and_join_date() {
        let (_client, inspector) = setup();
        let mut entry = raw(3, "Chi");
        let joined = chrono::DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .expect("date")
            .with_timezone(&chrono::Utc);
        entry.joined_at = Some(joined);

        let member = inspector.inspect(&entry).await.expect("lookup");
        assert!(!member.is_public_phone());
        assert_eq!(*member.join_date.as_datetime(), joined);
    }

    #[tokio::test]
    async fn test_restricted_profile_is_per_item_failure() {
        let (_client, inspector) = setup();
        let err = inspector.inspect(&raw(4, "Dung")).await.expect_err("restricted");
        assert!(matches!(err, ScanError::LookupFailed { ref member_id, .. } if member_id.as_str() == "4"));
        assert!(!err.is_scan_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_flood_is_per_item_failure_without_retry() {
        let (client, inspector) = setup();
        let started = tokio::time::Instant::now();

        let err = inspector.inspect(&raw(5, "Em")).await.expect_err("peer flood");
        assert!(matches!(
            err,
            ScanError::LookupFailed {
                source: rollcall_client::ClientError::Rpc { code: 400, .. },
                ..
            }
        ));
        assert_eq!(client.calls_of(CallKind::FullUser).len(), 1);
        assert_eq!(inspector.requester.flood_waits(), 0);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_unknown_member_is_per_item_failure() {
        let (_client, inspector) = setup();
        let err = inspector.inspect(&raw(99, "Ghost")).await.expect_err("unknown");
        assert!(matches!(err, ScanError::LookupFailed { .. }));
    }

    #[test]
    fn test_pacing_scales_with_roster() {
        let (_client, inspector) = setup();
        assert_eq!(inspector.pacing_delay(3), Duration::from_millis(500));
        assert_eq!(inspector.pacing_delay(800), Duration::from_millis(1_000));
        assert_eq!(inspector.pacing_delay(5_000), Duration::from_millis(2_000));
        assert_eq!(inspector.pacing_delay(20_000), Duration::from_millis(3_000));
    }
}
