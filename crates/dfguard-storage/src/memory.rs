//! In-process detection log store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use dfguard_models::{Classification, DetectionLog, DetectionLogId, NewDetectionLog};

use crate::error::{StorageError, StorageResult};
use crate::store::DetectionLogStore;

#[derive(Debug, Default)]
pub(crate) struct LogTable {
    pub(crate) next_id: DetectionLogId,
    pub(crate) entries: BTreeMap<DetectionLogId, DetectionLog>,
}

impl LogTable {
    pub(crate) fn from_entries(entries: Vec<DetectionLog>) -> Self {
        let next_id = entries.iter().map(|e| e.id).max().unwrap_or(0);
        Self {
            next_id,
            entries: entries.into_iter().map(|e| (e.id, e)).collect(),
        }
    }

    pub(crate) fn insert(&mut self, log: NewDetectionLog) -> DetectionLog {
        self.next_id += 1;
        let entry = log.with_id(self.next_id);
        self.entries.insert(entry.id, entry.clone());
        entry
    }

    pub(crate) fn get(&self, id: DetectionLogId) -> StorageResult<DetectionLog> {
        self.entries
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound(id))
    }

    pub(crate) fn list(&self) -> Vec<DetectionLog> {
        self.entries.values().cloned().collect()
    }

    pub(crate) fn list_by_classification(&self, classification: Classification) -> Vec<DetectionLog> {
        self.entries
            .values()
            .filter(|e| e.classification == classification)
            .cloned()
            .collect()
    }

    pub(crate) fn remove(&mut self, id: DetectionLogId) -> StorageResult<DetectionLog> {
        self.entries.remove(&id).ok_or(StorageError::NotFound(id))
    }
}

/// Detection logs held in memory for the lifetime of the process.
///
/// Ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct InMemoryLogStore {
    table: RwLock<LogTable>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl DetectionLogStore for InMemoryLogStore {
    async fn save(&self, log: NewDetectionLog) -> StorageResult<DetectionLog> {
        Ok(self.table.write().await.insert(log))
    }

    async fn get(&self, id: DetectionLogId) -> StorageResult<DetectionLog> {
        self.table.read().await.get(id)
    }

    async fn list(&self) -> StorageResult<Vec<DetectionLog>> {
        Ok(self.table.read().await.list())
    }

    async fn list_by_classification(
        &self,
        classification: Classification,
    ) -> StorageResult<Vec<DetectionLog>> {
        Ok(self.table.read().await.list_by_classification(classification))
    }

    async fn delete(&self, id: DetectionLogId) -> StorageResult<()> {
        self.table.write().await.remove(id).map(|_| ())
    }
}
