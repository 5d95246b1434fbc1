// ABOUTME: In-memory deployment store for tests and dry runs.
// ABOUTME: Keeps insertion order and applies the same whole-record replace semantics.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{DeploymentRecord, DeploymentStore, StoreError};

/// Non-durable [`DeploymentStore`].
#[derive(Debug, Default)]
pub struct MemoryDeploymentStore {
    records: Mutex<Vec<DeploymentRecord>>,
}

impl MemoryDeploymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records.
    pub fn with_records(records: impl IntoIterator<Item = DeploymentRecord>) -> Self {
        let store = Self::default();
        {
            let mut guard = store.records.lock();
            for record in records {
                replace_or_push(&mut guard, record);
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl DeploymentStore for MemoryDeploymentStore {
    async fn upsert(&self, record: &DeploymentRecord) -> Result<(), StoreError> {
        replace_or_push(&mut self.records.lock(), record.clone());
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<DeploymentRecord>, StoreError> {
        Ok(self.records.lock().clone())
    }
}

pub(super) fn replace_or_push(records: &mut Vec<DeploymentRecord>, record: DeploymentRecord) {
    match records.iter_mut().find(|r| r.id == record.id) {
        Some(existing) => *existing = record,
        None => records.push(record),
    }
}
