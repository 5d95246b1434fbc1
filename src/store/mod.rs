// ABOUTME: Durable deployment state: the record model and the store contract.
// ABOUTME: Exports the file-backed store used by the CLI and an in-memory store.

mod error;
mod file;
mod memory;
mod record;

pub use error::{StoreError, StoreErrorKind};
pub use file::{FileDeploymentStore, STATE_FILENAME};
pub(crate) use file::persist_json;
pub use memory::MemoryDeploymentStore;
pub use record::{CleanupPolicy, DeploymentRecord, DeploymentStatus, TestStatus, TtlOutOfRange};

use async_trait::async_trait;

use crate::types::DeploymentId;

/// Durable collection of [`DeploymentRecord`]s keyed by id.
///
/// Records are never physically removed; teardown is recorded as
/// [`DeploymentStatus::Deleted`].
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Write the whole record, replacing any prior version with the same id.
    async fn upsert(&self, record: &DeploymentRecord) -> Result<(), StoreError>;

    /// Every record ever written, in unspecified order. Empty if nothing was written yet.
    async fn get_all(&self) -> Result<Vec<DeploymentRecord>, StoreError>;

    /// Fetch one record, failing with [`StoreError::NotFound`] for unknown ids.
    async fn get(&self, id: &DeploymentId) -> Result<DeploymentRecord, StoreError> {
        self.get_all()
            .await?
            .into_iter()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::not_found(id))
    }

    /// Read-modify-write of `status`. No transition validity check is made.
    async fn update_status(
        &self,
        id: &DeploymentId,
        status: DeploymentStatus,
    ) -> Result<DeploymentRecord, StoreError> {
        let mut record = self.get(id).await?;
        record.status = status;
        self.upsert(&record).await?;
        Ok(record)
    }

    /// Read-modify-write of `test_status`, used by the validation runner.
    async fn update_test_status(
        &self,
        id: &DeploymentId,
        test_status: TestStatus,
    ) -> Result<DeploymentRecord, StoreError> {
        let mut record = self.get(id).await?;
        record.test_status = Some(test_status);
        self.upsert(&record).await?;
        Ok(record)
    }
}
