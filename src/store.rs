//! Storage boundary for discovered records.
//!
//! Search never depends on a concrete store; downstream stages (download
//! queues, persistence) implement [`RecordStore`] and receive records keyed
//! by the fingerprint of the query that found them. [`MemoryStore`] backs
//! tests and one-shot CLI runs.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::record::{DatasetRecord, FileRecord, IndexRecord};

/// Errors raised by a record store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected or lost a write.
    #[error("store backend failure: {reason}")]
    Backend {
        /// Backend-specific description.
        reason: String,
    },
}

/// Persistence boundary for assembled records.
///
/// Implementations must be idempotent on record fingerprints: inserting a
/// record twice leaves one copy.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Stores file records discovered by the query with fingerprint
    /// `query_sha`.
    async fn insert_files(
        &self,
        query_sha: &str,
        files: Vec<FileRecord>,
    ) -> Result<(), StoreError>;

    /// Stores dataset records discovered by the query with fingerprint
    /// `query_sha`.
    async fn insert_datasets(
        &self,
        query_sha: &str,
        datasets: Vec<DatasetRecord>,
    ) -> Result<(), StoreError>;

    /// True if a record with this fingerprint is already stored.
    async fn contains(&self, sha: &str) -> Result<bool, StoreError>;

    /// File records previously stored for a query fingerprint.
    async fn files_for(&self, query_sha: &str) -> Result<Vec<FileRecord>, StoreError>;
}

/// In-memory store used by tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: RwLock<HashMap<String, Vec<FileRecord>>>,
    datasets: RwLock<HashMap<String, Vec<DatasetRecord>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_files(
        &self,
        query_sha: &str,
        files: Vec<FileRecord>,
    ) -> Result<(), StoreError> {
        let mut map = self.files.write().await;
        let bucket = map.entry(query_sha.to_string()).or_default();
        let mut inserted = 0_usize;
        for file in files {
            if !bucket.iter().any(|existing| existing.sha() == file.sha()) {
                bucket.push(file);
                inserted += 1;
            }
        }
        debug!(query_sha, inserted, "stored file records");
        Ok(())
    }

    async fn insert_datasets(
        &self,
        query_sha: &str,
        datasets: Vec<DatasetRecord>,
    ) -> Result<(), StoreError> {
        let mut map = self.datasets.write().await;
        let bucket = map.entry(query_sha.to_string()).or_default();
        for dataset in datasets {
            if !bucket
                .iter()
                .any(|existing| existing.sha() == dataset.sha())
            {
                bucket.push(dataset);
            }
        }
        Ok(())
    }

    async fn contains(&self, sha: &str) -> Result<bool, StoreError> {
        let files = self.files.read().await;
        if files
            .values()
            .any(|bucket| bucket.iter().any(|file| file.sha() == sha))
        {
            return Ok(true);
        }
        let datasets = self.datasets.read().await;
        Ok(datasets
            .values()
            .any(|bucket| bucket.iter().any(|dataset| dataset.sha() == sha)))
    }

    async fn files_for(&self, query_sha: &str) -> Result<Vec<FileRecord>, StoreError> {
        let map = self.files.read().await;
        Ok(map.get(query_sha).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn file(id: &str) -> FileRecord {
        FileRecord::from_doc(&json!({
            "instance_id": id,
            "url": [format!("https://data.example/{id}|application/netcdf|HTTPServer")],
            "data_node": "data.example",
            "size": 10
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_fetch_files() {
        let store = MemoryStore::new();
        store
            .insert_files("abc123", vec![file("a.nc"), file("b.nc")])
            .await
            .unwrap();
        let files = store.files_for("abc123").await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(store.files_for("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_is_idempotent_on_fingerprint() {
        let store = MemoryStore::new();
        store
            .insert_files("abc123", vec![file("a.nc")])
            .await
            .unwrap();
        store
            .insert_files("abc123", vec![file("a.nc")])
            .await
            .unwrap();
        assert_eq!(store.files_for("abc123").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_contains_spans_record_types() {
        let store = MemoryStore::new();
        let record = file("a.nc");
        let sha = record.sha().to_string();
        assert!(!store.contains(&sha).await.unwrap());
        store.insert_files("abc123", vec![record]).await.unwrap();
        assert!(store.contains(&sha).await.unwrap());
    }
}
