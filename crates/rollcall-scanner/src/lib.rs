//! Rollcall Scanner - two-stage membership scan engine.
//!
//! Stage one enumerates a group's roster page by page; stage two walks the
//! roster one member at a time and asks the platform for each profile,
//! keeping the members whose phone number is disclosed. Both stages honour
//! provider flood-control waits, stop cooperatively on cancellation and hand
//! whatever they found to a [`ResultStore`], merged with earlier scans of
//! the same group.
//!
//! # Features
//!
//! - Flood-control backoff without a retry cap ([`RateLimitedRequester`])
//! - Lazy, deduplicating roster enumeration ([`MemberEnumerator`])
//! - Paced per-member profile lookups ([`ProfileInspector`])
//! - Progress and live results through a watch channel ([`ScanOrchestrator::subscribe`])
//! - Display filter and CSV export of stored reports
//!
//! # Example
//!
//! ```rust,ignore
//! use rollcall_scanner::{ScanOrchestrator, ScanTarget};
//! use std::sync::Arc;
//!
//! let orchestrator = ScanOrchestrator::new(
//!     Arc::new(client),
//!     Arc::new(database),
//!     config.scanning.clone(),
//! );
//!
//! let outcome = orchestrator.scan(&ScanTarget::handle("neighbours")).await?;
//! println!("{:?}: {} members with phone", outcome.status, outcome.found());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod enumerator;
pub mod error;
pub mod export;
pub mod filter;
pub mod inspector;
pub mod orchestrator;
pub mod progress;
pub mod requester;
pub mod store;

// Re-export commonly used types
pub use enumerator::{Enumeration, MemberEnumerator, Roster};
pub use error::{Result, ScanError};
pub use export::{file_name, write_csv};
pub use filter::MemberFilter;
pub use inspector::ProfileInspector;
pub use orchestrator::{ScanOrchestrator, ScanOutcome, ScanStats, ScanStatus, ScanTarget};
pub use progress::{CancelFlag, LiveMembers, ScanProgress, ScanState};
pub use requester::RateLimitedRequester;
pub use store::{MemoryResultStore, ResultStore};
