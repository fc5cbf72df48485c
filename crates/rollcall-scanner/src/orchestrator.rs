//! Scan orchestrator driving both stages for one group.
//!
//! `Idle -> EnumeratingMembers -> InspectingProfiles -> Finalizing` and then
//! one of `Completed`, `Cancelled` or `Failed`. Whatever was found before a
//! cancellation or an enumeration failure is still finalized and merged into
//! the stored report of the group.

use crate::enumerator::{Enumeration, MemberEnumerator};
use crate::error::{Result, ScanError};
use crate::inspector::ProfileInspector;
use crate::progress::{CancelFlag, LiveMembers, ScanProgress, ScanState};
use crate::requester::RateLimitedRequester;
use crate::store::ResultStore;
use rollcall_client::{ClientError, GroupEntity, PlatformClient, RawMember};
use rollcall_core::{GroupId, MemberId, ScanResult, ScanningConfig, Timestamp};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Group to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    /// Group id or public handle
    pub handle: String,
    /// Display name to fall back on when the platform returns none
    pub name: Option<String>,
    /// Best-known member count, used as the initial stage-one target
    pub member_count: Option<u64>,
}

impl ScanTarget {
    /// Target a group by id or public handle.
    #[must_use]
    pub fn handle(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            name: None,
            member_count: None,
        }
    }

    /// Target a group by id.
    #[must_use]
    pub fn group(id: &GroupId) -> Self {
        Self::handle(id.as_str())
    }

    /// Set the best-known member count.
    #[must_use]
    pub fn with_member_count(mut self, count: u64) -> Self {
        self.member_count = Some(count);
        self
    }
}

impl From<&GroupEntity> for ScanTarget {
    fn from(entity: &GroupEntity) -> Self {
        Self {
            handle: entity.id.to_string(),
            name: Some(entity.title.clone()),
            member_count: entity.participants_count,
        }
    }
}

/// How a scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    /// Both stages ran to the end
    Completed,
    /// Stopped on request
    Cancelled,
    /// Enumeration could not proceed
    Failed,
}

impl From<ScanStatus> for ScanState {
    fn from(status: ScanStatus) -> Self {
        match status {
            ScanStatus::Completed => Self::Completed,
            ScanStatus::Cancelled => Self::Cancelled,
            ScanStatus::Failed => Self::Failed,
        }
    }
}

/// Counters collected during one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Unique members enumerated in stage one
    pub roster_size: usize,
    /// Profiles looked up (or read from the roster entry) in stage two
    pub inspected: usize,
    /// Members skipped because a phone was already stored for them
    pub skipped_known: usize,
    /// Per-member lookups that failed
    pub lookup_failures: usize,
    /// Members with a phone found by this scan
    pub resolved: usize,
    /// Flood-control waits honoured
    pub flood_waits: u64,
}

/// Result of [`ScanOrchestrator::scan`].
#[derive(Debug)]
pub struct ScanOutcome {
    /// How the scan ended
    pub status: ScanStatus,
    /// Stored report after merging, when anything was persisted
    pub result: Option<ScanResult>,
    /// Error that failed the scan
    pub error: Option<ScanError>,
    /// Counters
    pub stats: ScanStats,
}

impl ScanOutcome {
    /// Members with a phone found by this scan.
    #[must_use]
    pub fn found(&self) -> usize {
        self.stats.resolved
    }

    fn failed_before_resolution(source: ClientError) -> Self {
        Self {
            status: ScanStatus::Failed,
            result: None,
            error: Some(ScanError::EnumerationFailed {
                observed: 0,
                source,
            }),
            stats: ScanStats::default(),
        }
    }
}

/// Clears the busy flag when a scan ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs membership scans over one connected client, one scan at a time.
pub struct ScanOrchestrator {
    client: Arc<dyn PlatformClient>,
    store: Arc<dyn ResultStore>,
    config: ScanningConfig,
    cancel: CancelFlag,
    live: LiveMembers,
    progress: watch::Sender<ScanProgress>,
    busy: AtomicBool,
}

impl ScanOrchestrator {
    /// Create an orchestrator.
    ///
    /// The client is borrowed for the orchestrator's lifetime; it must
    /// already be authenticated.
    #[must_use]
    pub fn new(
        client: Arc<dyn PlatformClient>,
        store: Arc<dyn ResultStore>,
        config: ScanningConfig,
    ) -> Self {
        let (progress, _) = watch::channel(ScanProgress::default());
        Self {
            client,
            store,
            config,
            cancel: CancelFlag::new(),
            live: LiveMembers::default(),
            progress,
            busy: AtomicBool::new(false),
        }
    }

    /// Receive a [`ScanProgress`] after every page and every member.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ScanProgress> {
        self.progress.subscribe()
    }

    /// Latest progress snapshot.
    #[must_use]
    pub fn progress(&self) -> ScanProgress {
        *self.progress.borrow()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ScanState {
        self.progress.borrow().state
    }

    /// Members found so far by the running (or last) scan.
    #[must_use]
    pub fn live_members(&self) -> LiveMembers {
        self.live.clone()
    }

    /// Flag that stops the running scan after its in-flight request.
    ///
    /// The flag is cleared when a scan ends. Setting it while no scan runs
    /// makes the next scan stop before its first roster page.
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Request cancellation of the running scan.
    pub fn cancel(&self) {
        tracing::info!("Scan cancellation requested");
        self.cancel.cancel();
    }

    /// Groups and channels visible to the account.
    pub async fn list_groups(&self, limit: usize) -> Result<Vec<GroupEntity>> {
        let requester = RateLimitedRequester::from_config(&self.config);
        self.ensure_connected(&requester).await?;
        Ok(requester
            .execute("list groups", || self.client.list_groups(limit))
            .await?)
    }

    /// Scan `target` and merge what was found into its stored report.
    ///
    /// Enumeration failures, cancellation and per-member lookup failures
    /// are reported through the returned [`ScanOutcome`]. `Err` is returned
    /// only when another scan is running or the result store fails.
    pub async fn scan(&self, target: &ScanTarget) -> Result<ScanOutcome> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(ScanError::ScanInProgress);
        }
        let _busy = BusyGuard(&self.busy);

        self.live.clear();

        let outcome = self.run(target).await;
        self.cancel.reset();
        match &outcome {
            Ok(outcome) => {
                self.publish(outcome.status.into(), self.progress().progress, self.progress().target);
                tracing::info!(
                    "Scan of {} ended {:?}: {} of {} members with phone, {} lookups failed, {} flood waits",
                    target.handle,
                    outcome.status,
                    outcome.stats.resolved,
                    outcome.stats.roster_size,
                    outcome.stats.lookup_failures,
                    outcome.stats.flood_waits
                );
            }
            Err(e) => {
                self.publish(ScanState::Failed, self.progress().progress, self.progress().target);
                tracing::error!("Scan of {} failed: {}", target.handle, e);
            }
        }
        outcome
    }

    async fn run(&self, target: &ScanTarget) -> Result<ScanOutcome> {
        let requester = Arc::new(RateLimitedRequester::from_config(&self.config));
        let mut target_size = target.member_count.unwrap_or(0);
        self.publish(ScanState::EnumeratingMembers, 0, target_size);

        let entity = match self.resolve(target, &requester).await {
            Ok(entity) => entity,
            Err(e) => {
                tracing::error!("Cannot start scan of {}: {}", target.handle, e);
                return Ok(ScanOutcome::failed_before_resolution(e));
            }
        };

        // Stage 1
        tracing::info!("Enumerating members of {} ({})", entity.title, entity.id);
        target_size = target_size.max(entity.participants_count.unwrap_or(0));
        self.publish(ScanState::EnumeratingMembers, 0, target_size);

        let enumerator = MemberEnumerator::new(
            Arc::clone(&self.client),
            Arc::clone(&requester),
            self.config.page_size,
        );
        let Enumeration {
            roster,
            error,
            cancelled,
            ..
        } = enumerator
            .enumerate(&entity, &self.cancel, |roster, total| {
                let observed = roster.len() as u64;
                target_size = target_size.max(total.unwrap_or(0)).max(observed);
                self.publish(ScanState::EnumeratingMembers, observed, target_size);
            })
            .await;

        let mut stats = ScanStats {
            roster_size: roster.len(),
            ..ScanStats::default()
        };
        let prior = self.store.get(&entity.id).await?;

        let status = if let Some(source) = error {
            Err(ScanError::EnumerationFailed {
                observed: roster.len(),
                source,
            })
        } else if cancelled {
            Ok(ScanStatus::Cancelled)
        } else {
            // Stage 2
            let known = if self.config.skip_known_phones {
                prior
                    .as_ref()
                    .map(ScanResult::known_phone_ids)
                    .unwrap_or_default()
            } else {
                HashSet::new()
            };
            Ok(self.inspect_roster(roster.members(), &known, &requester, &mut stats).await)
        };

        // Finalizing
        self.publish(ScanState::Finalizing, self.progress().progress, self.progress().target);
        let found = self.live.snapshot();
        stats.resolved = found.len();
        stats.flood_waits = requester.flood_waits();

        let result = if roster.is_empty() && found.is_empty() && prior.is_none() {
            None
        } else {
            let name = if entity.title.is_empty() {
                target.name.clone().unwrap_or_default()
            } else {
                entity.title.clone()
            };
            let fresh = ScanResult::new(
                entity.id.clone(),
                name,
                Timestamp::now(),
                found,
                roster.len() as u64,
            );
            Some(self.store.merge_and_persist(&fresh).await?)
        };

        let (status, error) = match status {
            Ok(status) => (status, None),
            Err(e) => (ScanStatus::Failed, Some(e)),
        };
        Ok(ScanOutcome {
            status,
            result,
            error,
            stats,
        })
    }

    /// Stage two over `roster`, strictly one member at a time.
    async fn inspect_roster(
        &self,
        roster: &[RawMember],
        known: &HashSet<MemberId>,
        requester: &Arc<RateLimitedRequester>,
        stats: &mut ScanStats,
    ) -> ScanStatus {
        let inspector = ProfileInspector::new(
            Arc::clone(&self.client),
            Arc::clone(requester),
            Duration::from_millis(self.config.inspect_delay_ms),
        );
        let total = roster.len() as u64;
        tracing::info!(
            "Inspecting {} profiles ({} already known)",
            roster.len(),
            roster.iter().filter(|m| known.contains(&m.id)).count()
        );
        self.publish(ScanState::InspectingProfiles, 0, total);

        for (index, raw) in roster.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::info!("Cancelled after {} of {} members", index, roster.len());
                return ScanStatus::Cancelled;
            }

            if known.contains(&raw.id) {
                stats.skipped_known += 1;
                self.publish(ScanState::InspectingProfiles, index as u64 + 1, total);
                continue;
            }

            stats.inspected += 1;
            match inspector.inspect(raw).await {
                Ok(member) if member.is_public_phone() => {
                    tracing::debug!("Member {} has a public phone", member.id);
                    self.live.push(member);
                }
                Ok(member) => tracing::debug!("Member {} hides their phone", member.id),
                Err(e) => {
                    stats.lookup_failures += 1;
                    tracing::warn!("{}", e);
                }
            }
            self.publish(ScanState::InspectingProfiles, index as u64 + 1, total);

            if index + 1 < roster.len() {
                inspector.pace(roster.len()).await;
            }
        }

        ScanStatus::Completed
    }

    async fn resolve(
        &self,
        target: &ScanTarget,
        requester: &RateLimitedRequester,
    ) -> std::result::Result<GroupEntity, ClientError> {
        self.ensure_connected(requester).await?;
        requester
            .execute("get entity", || self.client.get_entity(&target.handle))
            .await
    }

    async fn ensure_connected(
        &self,
        requester: &RateLimitedRequester,
    ) -> std::result::Result<(), ClientError> {
        if !self.client.is_connected() {
            tracing::info!("Client not connected, connecting");
            requester
                .execute("connect", || self.client.connect())
                .await?;
        }
        Ok(())
    }

    fn publish(&self, state: ScanState, progress: u64, target: u64) {
        self.progress.send_replace(ScanProgress {
            state,
            progress,
            target,
            found: self.live.len(),
        });
    }
}
