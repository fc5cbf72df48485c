//! Rollcall Core - Foundation crate for the Rollcall membership scanner.
//!
//! This crate provides the shared domain model, error handling and
//! configuration management that all other Rollcall crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Identifier newtypes, `Member`, `ScanResult` and the merge rule
//!
//! # Example
//!
//! ```rust
//! use rollcall_core::{AppConfig, GroupId, ScanResult};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.scanning.page_size, 200);
//!
//! let group = GroupId::new("-1001234567890")?;
//! let result = ScanResult::new(group, "Neighbours", chrono::Utc::now(), Vec::new(), 0);
//! assert!(result.members.is_empty());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, ExportConfig, ExportLocale, ScanningConfig, StorageConfig};
pub use error::{ConfigError, ConfigResult, Result, RollcallError};
pub use types::{GroupId, Member, MemberId, ScanResult, Timestamp};
