//! Rollcall Database Layer
//!
//! Provides `SQLite` persistence for scan reports. Uses `SQLx` with embedded
//! migrations.
//!
//! # Architecture
//!
//! - **Storage**: one row per group in `scan_results`, its members in `scan_members`
//! - **Migrations**: SQL migrations are embedded and versioned using `SQLx`
//! - **Merging**: [`scan_results::merge_and_persist`] merges a fresh snapshot
//!   with the stored one inside a single transaction
//!
//! # Example
//!
//! ```ignore
//! use rollcall_db::Database;
//!
//! let db = Database::new("reports.db").await?;
//! db.run_migrations().await?;
//! let recent = db.list_by_recency().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod migrations;
pub mod scan_results;

// Re-export commonly used types
pub use error::{DatabaseError, Result};

use rollcall_core::{GroupId, ScanResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

/// High-level database interface.
///
/// Owns the connection pool and exposes the report operations the scanner
/// and the CLI need. Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open (creating if missing) a database at `path`.
    ///
    /// `:memory:` opens a private in-memory database held by a single
    /// connection, so every query sees the same data.
    ///
    /// # Errors
    /// Returns `DatabaseError::Open` if the database cannot be opened.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_str().ok_or_else(|| {
            DatabaseError::Open("invalid database path: not valid UTF-8".to_string())
        })?;
        let in_memory = path_str == ":memory:";

        let connect_options = SqliteConnectOptions::from_str(path_str)
            .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(connect_options)
            .await
            .map_err(|e| DatabaseError::Open(format!("failed to open {path_str}: {e}")))?;

        tracing::info!("Database pool created at {}", path_str);

        Ok(Self { pool })
    }

    /// Open a database and bring its schema up to date.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Self::new(path).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all pending database migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get the current schema version.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Merge `fresh` with the stored snapshot of its group and store the result.
    ///
    /// Returns the snapshot as stored.
    pub async fn merge_and_persist(&self, fresh: &ScanResult) -> Result<ScanResult> {
        scan_results::merge_and_persist(&self.pool, fresh).await
    }

    /// Stored snapshot of one group.
    pub async fn get_by_group(&self, group_id: &GroupId) -> Result<Option<ScanResult>> {
        scan_results::get_by_group(&self.pool, group_id).await
    }

    /// All stored snapshots, most recent first.
    pub async fn list_by_recency(&self) -> Result<Vec<ScanResult>> {
        scan_results::list_by_recency(&self.pool).await
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = Database::open(":memory:").await.expect("open database");
        assert_eq!(db.get_schema_version().await.expect("version"), 1);
        assert!(db.list_by_recency().await.expect("list").is_empty());
        db.close().await;
    }

    #[tokio::test]
    async fn test_open_file_persists_across_connections() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("reports.db");

        let db = Database::open(&path).await.expect("open database");
        let result = ScanResult::new(GroupId::from(-5), "Book club", chrono::Utc::now(), Vec::new(), 12);
        db.merge_and_persist(&result).await.expect("persist");
        db.close().await;

        let reopened = Database::open(&path).await.expect("reopen database");
        let stored = reopened
            .get_by_group(&GroupId::from(-5))
            .await
            .expect("query")
            .expect("stored snapshot");
        assert_eq!(stored.total_in_group, 12);
        assert_eq!(stored.group_name, "Book club");
    }
}
