//! Where finalized scan results go.

use crate::error::Result;
use async_trait::async_trait;
use rollcall_core::{GroupId, ScanResult};
use rollcall_db::Database;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Persistent collection of scan reports, one per group.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Merge `result` into the entry for its group, store it and return
    /// the merged record.
    async fn merge_and_persist(&self, result: &ScanResult) -> Result<ScanResult>;

    /// Every stored report, most recent first.
    async fn list_by_recency(&self) -> Result<Vec<ScanResult>>;

    /// The stored report for one group.
    async fn get(&self, group_id: &GroupId) -> Result<Option<ScanResult>>;
}

#[async_trait]
impl ResultStore for Database {
    async fn merge_and_persist(&self, result: &ScanResult) -> Result<ScanResult> {
        Ok(Database::merge_and_persist(self, result).await?)
    }

    async fn list_by_recency(&self) -> Result<Vec<ScanResult>> {
        Ok(Database::list_by_recency(self).await?)
    }

    async fn get(&self, group_id: &GroupId) -> Result<Option<ScanResult>> {
        Ok(self.get_by_group(group_id).await?)
    }
}

/// In-process store for embedders without persistence, and for tests.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    results: Mutex<HashMap<GroupId, ScanResult>>,
}

impl MemoryResultStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with existing reports.
    #[must_use]
    pub fn with_results(results: impl IntoIterator<Item = ScanResult>) -> Self {
        let store = Self::new();
        {
            let mut map = store.results.lock().unwrap_or_else(PoisonError::into_inner);
            for result in results {
                map.insert(result.group_id.clone(), result);
            }
        }
        store
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn merge_and_persist(&self, result: &ScanResult) -> Result<ScanResult> {
        let mut map = self.results.lock().unwrap_or_else(PoisonError::into_inner);
        let merged = match map.get(&result.group_id) {
            Some(existing) => existing.merge(result)?,
            None => result.clone(),
        };
        map.insert(merged.group_id.clone(), merged.clone());
        Ok(merged)
    }

    async fn list_by_recency(&self) -> Result<Vec<ScanResult>> {
        let map = self.results.lock().unwrap_or_else(PoisonError::into_inner);
        let mut results: Vec<ScanResult> = map.values().cloned().collect();
        results.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.group_id.cmp(&b.group_id))
        });
        Ok(results)
    }

    async fn get(&self, group_id: &GroupId) -> Result<Option<ScanResult>> {
        let map = self.results.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(group_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rollcall_core::{Member, MemberId, Timestamp};

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from(Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap())
    }

    fn snapshot(group: i64, at: i64, ids: &[i64]) -> ScanResult {
        let members = ids
            .iter()
            .map(|id| {
                Member::new(MemberId::from(*id), "M", "", ts(0)).with_phone(Some(format!("+{id}")))
            })
            .collect();
        ScanResult::new(GroupId::from(group), "Group", ts(at), members, ids.len() as u64)
    }

    async fn exercise(store: &dyn ResultStore) {
        store
            .merge_and_persist(&snapshot(-1, 0, &[1, 3]))
            .await
            .expect("first");
        let merged = store
            .merge_and_persist(&snapshot(-1, 10, &[2]))
            .await
            .expect("second");
        assert_eq!(merged.members.len(), 3);
        assert_eq!(merged.total_in_group, 2);

        store
            .merge_and_persist(&snapshot(-2, 5, &[9]))
            .await
            .expect("other group");

        let listed = store.list_by_recency().await.expect("list");
        let order: Vec<&str> = listed.iter().map(|r| r.group_id.as_str()).collect();
        assert_eq!(order, vec!["-1", "-2"]);

        let stored = store.get(&GroupId::from(-1)).await.expect("get").expect("present");
        assert_eq!(stored, merged);
        assert!(store.get(&GroupId::from(-3)).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_memory_store_merges() {
        exercise(&MemoryResultStore::new()).await;
    }

    #[tokio::test]
    async fn test_database_store_merges() {
        let db = Database::open(":memory:").await.expect("open database");
        exercise(&db).await;
    }
}
