//! Stage one: roster enumeration.
//!
//! Supergroups and channels are listed page by page starting at offset 0;
//! the listing ends on an empty page or on a page shorter than the page
//! size. Basic groups have no paginated listing and are read with a single
//! full-info call instead.

use crate::progress::CancelFlag;
use crate::requester::RateLimitedRequester;
use futures::stream::{self, BoxStream, StreamExt};
use rollcall_client::{ClientError, GroupEntity, ParticipantsPage, PlatformClient, RawMember};
use rollcall_core::MemberId;
use std::collections::HashSet;
use std::sync::Arc;

/// Roster accumulated across pages, unique by member id.
///
/// Pages may overlap when membership changes between fetches, so every
/// entry is checked against the ids already seen.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: Vec<RawMember>,
    seen: HashSet<MemberId>,
}

impl Roster {
    /// Empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page, skipping ids already present. Returns how many were new.
    pub fn extend(&mut self, page: impl IntoIterator<Item = RawMember>) -> usize {
        let before = self.members.len();
        for member in page {
            if self.seen.insert(member.id.clone()) {
                self.members.push(member);
            }
        }
        self.members.len() - before
    }

    /// Number of unique members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether no member was listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in listing order.
    #[must_use]
    pub fn members(&self) -> &[RawMember] {
        &self.members
    }

    /// Consume the roster.
    #[must_use]
    pub fn into_members(self) -> Vec<RawMember> {
        self.members
    }
}

/// Outcome of a complete enumeration run.
#[derive(Debug, Default)]
pub struct Enumeration {
    /// Everything listed before the run ended
    pub roster: Roster,
    /// Largest member count the platform reported alongside a page
    pub reported_total: Option<u64>,
    /// Error that ended the run early, if any
    pub error: Option<ClientError>,
    /// Whether the run stopped because cancellation was requested
    pub cancelled: bool,
}

/// Lists a group's roster through the rate-limited requester.
pub struct MemberEnumerator {
    client: Arc<dyn PlatformClient>,
    requester: Arc<RateLimitedRequester>,
    page_size: u32,
}

impl MemberEnumerator {
    /// Create an enumerator fetching `page_size` members per call.
    #[must_use]
    pub fn new(
        client: Arc<dyn PlatformClient>,
        requester: Arc<RateLimitedRequester>,
        page_size: u32,
    ) -> Self {
        Self {
            client,
            requester,
            page_size: page_size.max(1),
        }
    }

    /// Lazy sequence of roster pages for `entity`.
    ///
    /// Each poll fetches at most one page. The stream ends after the last
    /// page, after the first error, or before the next fetch once `cancel`
    /// is set. It cannot be resumed; call again to restart from offset 0.
    #[must_use]
    pub fn pages(
        &self,
        entity: GroupEntity,
        cancel: CancelFlag,
    ) -> BoxStream<'static, Result<ParticipantsPage, ClientError>> {
        let client = Arc::clone(&self.client);
        let requester = Arc::clone(&self.requester);
        let entity = Arc::new(entity);
        let page_size = self.page_size;

        stream::unfold(Some(0_u64), move |cursor| {
            let client = Arc::clone(&client);
            let requester = Arc::clone(&requester);
            let entity = Arc::clone(&entity);
            let cancel = cancel.clone();

            async move {
                let offset = cursor?;
                if cancel.is_cancelled() {
                    return None;
                }

                if !entity.kind.is_paginated() {
                    let result = requester
                        .execute("full chat", || client.get_full_chat(&entity))
                        .await
                        .map(|participants| ParticipantsPage {
                            total: Some(participants.len() as u64),
                            participants,
                        });
                    return Some((result, None));
                }

                let result = requester
                    .execute("participants page", || {
                        client.get_participants(&entity, offset, page_size)
                    })
                    .await;

                match result {
                    Ok(page) => {
                        let len = page.participants.len() as u64;
                        tracing::debug!(
                            "Fetched {} participants of {} at offset {}",
                            len,
                            entity.id,
                            offset
                        );
                        let next = (len > 0 && len >= u64::from(page_size)).then_some(offset + len);
                        Some((Ok(page), next))
                    }
                    Err(e) => Some((Err(e), None)),
                }
            }
        })
        .boxed()
    }

    /// Drain [`pages`](Self::pages) into a deduplicated roster.
    ///
    /// `on_page` runs after every page with the roster so far and the
    /// platform-reported total of that page. A failing page ends the run but
    /// keeps everything listed before it.
    pub async fn enumerate(
        &self,
        entity: &GroupEntity,
        cancel: &CancelFlag,
        mut on_page: impl FnMut(&Roster, Option<u64>) + Send,
    ) -> Enumeration {
        let mut outcome = Enumeration::default();
        let mut pages = self.pages(entity.clone(), cancel.clone());

        while let Some(page) = pages.next().await {
            match page {
                Ok(page) => {
                    outcome.roster.extend(page.participants);
                    if let Some(total) = page.total {
                        outcome.reported_total = Some(outcome.reported_total.unwrap_or(0).max(total));
                    }
                    on_page(&outcome.roster, page.total);
                }
                Err(e) => {
                    tracing::error!(
                        "Enumeration of {} aborted after {} members: {}",
                        entity.id,
                        outcome.roster.len(),
                        e
                    );
                    outcome.error = Some(e);
                    break;
                }
            }
        }

        outcome.cancelled = outcome.error.is_none() && cancel.is_cancelled();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_client::{CallKind, Fixture, FixtureClient, FixtureGroup, GroupKind};
    use rollcall_core::GroupId;
    use std::time::Duration;

    fn fixture(kind: GroupKind, size: i64) -> Fixture {
        Fixture {
            groups: vec![FixtureGroup {
                id: GroupId::from(-100),
                title: "Test".to_string(),
                kind,
                handle: Some("test".to_string()),
                participants_count: None,
                members: (1..=size)
                    .map(|id| RawMember::new(MemberId::from(id), format!("M{id}"), ""))
                    .collect(),
            }],
            profiles: std::collections::HashMap::new(),
        }
    }

    fn enumerator(client: &Arc<FixtureClient>, page_size: u32) -> MemberEnumerator {
        let requester = Arc::new(RateLimitedRequester::new(
            Duration::from_secs(1),
            Duration::from_secs(30),
        ));
        MemberEnumerator::new(Arc::clone(client) as Arc<dyn PlatformClient>, requester, page_size)
    }

    async fn entity(client: &FixtureClient) -> GroupEntity {
        client.get_entity("test").await.expect("group")
    }

    #[test]
    fn test_roster_deduplicates() {
        let mut roster = Roster::new();
        let a = RawMember::new(MemberId::from(1), "A", "");
        let b = RawMember::new(MemberId::from(2), "B", "");
        assert_eq!(roster.extend(vec![a.clone(), b.clone()]), 2);
        assert_eq!(roster.extend(vec![b, a]), 0);
        assert_eq!(roster.len(), 2);
    }

    #[tokio::test]
    async fn test_stops_on_short_page() {
        let client = Arc::new(FixtureClient::new(fixture(GroupKind::Supergroup, 10)));
        let group = entity(&client).await;

        let outcome = enumerator(&client, 4)
            .enumerate(&group, &CancelFlag::new(), |_, _| {})
            .await;

        assert_eq!(outcome.roster.len(), 10);
        assert!(outcome.error.is_none());
        assert_eq!(client.calls_of(CallKind::Participants).len(), 3);
    }

    #[tokio::test]
    async fn test_stops_on_empty_page() {
        let client = Arc::new(FixtureClient::new(fixture(GroupKind::Channel, 8)));
        let group = entity(&client).await;

        let outcome = enumerator(&client, 4)
            .enumerate(&group, &CancelFlag::new(), |_, _| {})
            .await;

        assert_eq!(outcome.roster.len(), 8);
        let offsets: Vec<String> = client
            .calls_of(CallKind::Participants)
            .into_iter()
            .map(|c| c.target)
            .collect();
        assert_eq!(offsets, vec!["0", "4", "8"]);
    }

    #[tokio::test]
    async fn test_overlapping_pages_yield_unique_roster() {
        let client = Arc::new(FixtureClient::new(fixture(GroupKind::Supergroup, 10)).with_page_overlap(1));
        let group = entity(&client).await;

        let outcome = enumerator(&client, 4)
            .enumerate(&group, &CancelFlag::new(), |_, _| {})
            .await;

        let ids: HashSet<&str> = outcome.roster.members().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.len(), outcome.roster.len());
        assert_eq!(outcome.roster.len(), 10);
    }

    #[tokio::test]
    async fn test_basic_group_uses_single_call() {
        let client = Arc::new(FixtureClient::new(fixture(GroupKind::BasicGroup, 5)));
        let group = entity(&client).await;

        let mut pages_seen = 0;
        let outcome = enumerator(&client, 2)
            .enumerate(&group, &CancelFlag::new(), |_, _| pages_seen += 1)
            .await;

        assert_eq!(outcome.roster.len(), 5);
        assert_eq!(pages_seen, 1);
        assert_eq!(client.calls_of(CallKind::FullChat).len(), 1);
        assert!(client.calls_of(CallKind::Participants).is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_partial_roster() {
        let client = Arc::new(
            FixtureClient::new(fixture(GroupKind::Supergroup, 10))
                .failing_after_pages(2, ClientError::Transport("connection reset".to_string())),
        );
        let group = entity(&client).await;

        let outcome = enumerator(&client, 3)
            .enumerate(&group, &CancelFlag::new(), |_, _| {})
            .await;

        assert_eq!(outcome.roster.len(), 6);
        assert!(matches!(outcome.error, Some(ClientError::Transport(_))));
        assert!(!outcome.cancelled);
    }

    #[tokio::test]
    async fn test_cancel_before_next_page() {
        let client = Arc::new(FixtureClient::new(fixture(GroupKind::Supergroup, 10)));
        let group = entity(&client).await;
        let cancel = CancelFlag::new();

        let outcome = enumerator(&client, 3)
            .enumerate(&group, &cancel, |roster, _| {
                if roster.len() >= 3 {
                    cancel.cancel();
                }
            })
            .await;

        assert_eq!(outcome.roster.len(), 3);
        assert!(outcome.cancelled);
        assert_eq!(client.calls_of(CallKind::Participants).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flood_on_page_is_retried() {
        let client = Arc::new(FixtureClient::new(fixture(GroupKind::Supergroup, 6)).with_page_flood(1, Some(4)));
        let group = entity(&client).await;

        let outcome = enumerator(&client, 3)
            .enumerate(&group, &CancelFlag::new(), |_, _| {})
            .await;

        assert_eq!(outcome.roster.len(), 6);
        let calls = client.calls_of(CallKind::Participants);
        assert!(calls[1].failed);
        assert!(calls[2].at.duration_since(calls[1].at) >= Duration::from_secs(5));
    }
}
