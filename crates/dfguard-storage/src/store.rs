//! Detection log store interface.

use async_trait::async_trait;

use dfguard_models::{Classification, DetectionLog, DetectionLogId, NewDetectionLog};

use crate::error::StorageResult;

/// Persistence for detection logs.
///
/// Listing operations return entries in ascending id order.
#[async_trait]
pub trait DetectionLogStore: Send + Sync {
    /// Persist a log and return it with its assigned id.
    async fn save(&self, log: NewDetectionLog) -> StorageResult<DetectionLog>;

    async fn get(&self, id: DetectionLogId) -> StorageResult<DetectionLog>;

    async fn list(&self) -> StorageResult<Vec<DetectionLog>>;

    async fn list_by_classification(
        &self,
        classification: Classification,
    ) -> StorageResult<Vec<DetectionLog>>;

    /// Remove a log; `NotFound` when it does not exist.
    async fn delete(&self, id: DetectionLogId) -> StorageResult<()>;

    /// Cheap liveness check for readiness probes.
    async fn check(&self) -> StorageResult<()> {
        Ok(())
    }
}
