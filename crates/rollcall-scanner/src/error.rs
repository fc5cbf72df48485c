//! Scan error types.

use rollcall_client::ClientError;
use rollcall_core::{MemberId, RollcallError};
use rollcall_db::DatabaseError;
use thiserror::Error;

/// Errors raised while scanning, storing or exporting.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Stage one could not proceed; the roster gathered so far is kept.
    #[error("member enumeration failed after {observed} members: {source}")]
    EnumerationFailed {
        /// Roster size reached before the failure
        observed: usize,
        /// Underlying client error
        #[source]
        source: ClientError,
    },

    /// One member's profile could not be resolved.
    #[error("profile lookup failed for member {member_id}: {source}")]
    LookupFailed {
        /// Member whose lookup failed
        member_id: MemberId,
        /// Underlying client error
        #[source]
        source: ClientError,
    },

    /// The orchestrator is already running a scan.
    #[error("a scan is already in progress")]
    ScanInProgress,

    /// Connection or entity resolution failed before the scan started.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// Result store failure.
    #[error("store error: {0}")]
    Store(#[from] DatabaseError),

    /// Invalid data, such as merging results of different groups.
    #[error("validation error: {0}")]
    Validation(#[from] RollcallError),

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error while exporting.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    /// True for errors that abort a whole scan rather than a single member.
    #[must_use]
    pub fn is_scan_failure(&self) -> bool {
        !matches!(self, Self::LookupFailed { .. })
    }
}

/// Result type alias for scanner operations.
pub type Result<T> = std::result::Result<T, ScanError>;
