//! Detection log store backed by a JSON file.
//!
//! The whole table is rewritten on every mutation: the new contents go to a
//! sibling temp file which is then renamed over the original.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use dfguard_models::{Classification, DetectionLog, DetectionLogId, NewDetectionLog};

use crate::error::{StorageError, StorageResult};
use crate::memory::LogTable;
use crate::store::DetectionLogStore;

/// Detection logs persisted as a JSON array on local disk.
#[derive(Debug)]
pub struct JsonFileLogStore {
    path: PathBuf,
    table: Mutex<LogTable>,
}

impl JsonFileLogStore {
    /// Open the store at `path`, creating an empty table if the file is absent.
    pub async fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();

        let table = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => LogTable::default(),
            Ok(bytes) => {
                let entries: Vec<DetectionLog> = serde_json::from_slice(&bytes).map_err(|e| {
                    StorageError::corrupt(format!("{}: {}", path.display(), e))
                })?;
                LogTable::from_entries(entries)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LogTable::default(),
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %path.display(),
            entries = table.entries.len(),
            "Opened detection log file"
        );

        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, table: &LogTable) -> StorageResult<()> {
        let entries: Vec<&DetectionLog> = table.entries.values().collect();
        let bytes = serde_json::to_vec_pretty(&entries)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), entries = entries.len(), "Detection logs flushed");
        Ok(())
    }
}

#[async_trait]
impl DetectionLogStore for JsonFileLogStore {
    async fn save(&self, log: NewDetectionLog) -> StorageResult<DetectionLog> {
        let mut table = self.table.lock().await;
        let entry = table.insert(log);
        if let Err(e) = self.persist(&table).await {
            table.entries.remove(&entry.id);
            return Err(e);
        }
        Ok(entry)
    }

    async fn get(&self, id: DetectionLogId) -> StorageResult<DetectionLog> {
        self.table.lock().await.get(id)
    }

    async fn list(&self) -> StorageResult<Vec<DetectionLog>> {
        Ok(self.table.lock().await.list())
    }

    async fn list_by_classification(
        &self,
        classification: Classification,
    ) -> StorageResult<Vec<DetectionLog>> {
        Ok(self.table.lock().await.list_by_classification(classification))
    }

    async fn delete(&self, id: DetectionLogId) -> StorageResult<()> {
        let mut table = self.table.lock().await;
        let removed = table.remove(id)?;
        if let Err(e) = self.persist(&table).await {
            table.entries.insert(removed.id, removed);
            return Err(e);
        }
        Ok(())
    }

    async fn check(&self) -> StorageResult<()> {
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use dfguard_models::{FinalVerdict, MediaKind};

    fn new_log(kind: MediaKind, score: f64) -> NewDetectionLog {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
        NewDetectionLog::from_verdict(kind, &FinalVerdict::from_score(score, 10.0), at)
    }

    #[tokio::test]
    async fn test_logs_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("detections.json");

        let store = JsonFileLogStore::open(&path).await.unwrap();
        store.save(new_log(MediaKind::Video, 80.0)).await.unwrap();
        store.save(new_log(MediaKind::Audio, 1.0)).await.unwrap();
        store.delete(1).await.unwrap();
        drop(store);

        let reopened = JsonFileLogStore::open(&path).await.unwrap();
        let entries = reopened.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, 2);
        assert_eq!(entries[0].media_kind, MediaKind::Audio);

        let next = reopened.save(new_log(MediaKind::Video, 50.0)).await.unwrap();
        assert_eq!(next.id, 3);
    }

    #[tokio::test]
    async fn test_missing_and_empty_files_open_empty() {
        let dir = tempfile::tempdir().unwrap();

        let missing = JsonFileLogStore::open(dir.path().join("none.json")).await.unwrap();
        assert!(missing.list().await.unwrap().is_empty());

        let blank_path = dir.path().join("blank.json");
        tokio::fs::write(&blank_path, b"\n").await.unwrap();
        let blank = JsonFileLogStore::open(&blank_path).await.unwrap();
        assert!(blank.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let err = JsonFileLogStore::open(&path).await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt(_)));
    }
}
