//! Scan state, progress snapshots and the handles shared with observers.

use rollcall_core::Member;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Orchestrator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// No scan in progress
    #[default]
    Idle,
    /// Stage one: listing the roster
    EnumeratingMembers,
    /// Stage two: looking up profiles one by one
    InspectingProfiles,
    /// Merging and persisting the result
    Finalizing,
    /// Finished normally
    Completed,
    /// Stopped on request; partial results were kept
    Cancelled,
    /// Enumeration aborted; partial results were kept
    Failed,
}

impl ScanState {
    /// True for `Completed`, `Cancelled` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// True while one of the two scanning stages runs.
    #[must_use]
    pub fn is_scanning(self) -> bool {
        matches!(self, Self::EnumeratingMembers | Self::InspectingProfiles)
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::EnumeratingMembers => "enumerating members",
            Self::InspectingProfiles => "inspecting profiles",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Snapshot published to observers after every page and every member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Current state
    pub state: ScanState,
    /// Members observed (stage one) or inspected (stage two)
    pub progress: u64,
    /// Best-known group size (stage one) or roster size (stage two)
    pub target: u64,
    /// Members with a resolved phone found during this scan
    pub found: usize,
}

impl ScanProgress {
    /// Completion ratio in `[0, 1]`, or 0 when the target is unknown.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(&self) -> f64 {
        if self.target == 0 {
            0.0
        } else {
            (self.progress as f64 / self.target as f64).min(1.0)
        }
    }
}

/// Cooperative cancellation flag.
///
/// Checked before every page fetch and every profile inspection. Setting it
/// never interrupts a request already in flight.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A flag that is not set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Members found so far by the running scan.
///
/// Only the orchestrator appends; observers read copies, so they never see
/// a half-written list.
#[derive(Debug, Clone, Default)]
pub struct LiveMembers(Arc<RwLock<Vec<Member>>>);

impl LiveMembers {
    /// Copy of the current list.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Member> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of members found so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing was found yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn push(&self, member: Member) {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(member);
    }

    pub(crate) fn clear(&self) {
        self.0.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{MemberId, Timestamp};

    #[test]
    fn test_terminal_states() {
        assert!(ScanState::Completed.is_terminal());
        assert!(ScanState::Cancelled.is_terminal());
        assert!(ScanState::Failed.is_terminal());
        assert!(!ScanState::Finalizing.is_terminal());
        assert!(ScanState::InspectingProfiles.is_scanning());
        assert!(!ScanState::Idle.is_scanning());
    }

    #[test]
    fn test_progress_ratio() {
        let progress = ScanProgress {
            state: ScanState::InspectingProfiles,
            progress: 3,
            target: 4,
            found: 1,
        };
        assert!((progress.ratio() - 0.75).abs() < f64::EPSILON);
        assert!(ScanProgress::default().ratio().abs() < f64::EPSILON);
    }

    #[test]
    fn test_cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let observer = flag.clone();
        observer.cancel();
        assert!(flag.is_cancelled());
        flag.reset();
        assert!(!observer.is_cancelled());
    }

    #[test]
    fn test_live_members_snapshot_is_a_copy() {
        let live = LiveMembers::default();
        live.push(Member::new(MemberId::from(1), "An", "", Timestamp::now()));

        let snapshot = live.snapshot();
        live.push(Member::new(MemberId::from(2), "Binh", "", Timestamp::now()));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(live.len(), 2);
        live.clear();
        assert!(live.is_empty());
    }
}
