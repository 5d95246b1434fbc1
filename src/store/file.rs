// ABOUTME: File-backed deployment store persisting all records in one JSON document.
// ABOUTME: Every write goes through a temp file and an atomic rename.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::error::{CreateDirSnafu, ParseSnafu, ReadSnafu, SerializeSnafu, TaskSnafu, WriteSnafu};
use super::memory::replace_or_push;
use super::{DeploymentRecord, DeploymentStatus, DeploymentStore, StoreError, TestStatus};
use crate::types::DeploymentId;

/// Name of the state document inside the state directory.
pub const STATE_FILENAME: &str = "deployments.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default)]
    deployments: Vec<DeploymentRecord>,
}

/// File-backed implementation of [`DeploymentStore`].
///
/// All records live in `{state_dir}/deployments.json`. Writes serialize
/// through an async mutex so that each read-modify-write sees the latest
/// document, and the document is replaced atomically so a crash mid-write
/// leaves the previous version intact.
pub struct FileDeploymentStore {
    state_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for FileDeploymentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDeploymentStore")
            .field("state_dir", &self.state_dir)
            .finish()
    }
}

impl FileDeploymentStore {
    /// Open (and create if needed) a store rooted at `state_dir`.
    pub async fn open(state_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let state_dir = state_dir.into();
        tokio::fs::create_dir_all(&state_dir)
            .await
            .context(CreateDirSnafu { path: &state_dir })?;

        Ok(Self {
            state_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILENAME)
    }

    async fn load(&self) -> Result<StateDocument, StoreError> {
        let path = self.state_path();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StateDocument::default());
            }
            Err(e) => return Err(e).context(ReadSnafu { path }),
        };

        if content.trim().is_empty() {
            return Ok(StateDocument::default());
        }

        serde_json::from_str(&content).context(ParseSnafu { path })
    }

    async fn save(&self, document: &StateDocument) -> Result<(), StoreError> {
        persist_json(&self.state_dir, &self.state_path(), document).await
    }

    async fn modify<F>(&self, id: &DeploymentId, apply: F) -> Result<DeploymentRecord, StoreError>
    where
        F: FnOnce(&mut DeploymentRecord) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;

        let record = document
            .deployments
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::not_found(id))?;
        apply(record);
        let updated = record.clone();

        self.save(&document).await?;
        tracing::debug!(id = %id, status = %updated.status, "updated deployment record");
        Ok(updated)
    }
}

#[async_trait]
impl DeploymentStore for FileDeploymentStore {
    async fn upsert(&self, record: &DeploymentRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        replace_or_push(&mut document.deployments, record.clone());
        self.save(&document).await?;
        tracing::debug!(id = %record.id, status = %record.status, "saved deployment record");
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<DeploymentRecord>, StoreError> {
        Ok(self.load().await?.deployments)
    }

    async fn update_status(
        &self,
        id: &DeploymentId,
        status: DeploymentStatus,
    ) -> Result<DeploymentRecord, StoreError> {
        self.modify(id, |record| record.status = status).await
    }

    async fn update_test_status(
        &self,
        id: &DeploymentId,
        test_status: TestStatus,
    ) -> Result<DeploymentRecord, StoreError> {
        self.modify(id, |record| record.test_status = Some(test_status))
            .await
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
///
/// `dir` is created if missing and must be the directory containing `path`.
pub(crate) async fn persist_json<T: Serialize + ?Sized>(
    dir: &Path,
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    tokio::fs::create_dir_all(dir)
        .await
        .context(CreateDirSnafu { path: dir })?;
    let bytes = serde_json::to_vec_pretty(value).context(SerializeSnafu)?;
    let dir = dir.to_path_buf();
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &bytes))
        .await
        .context(TaskSnafu)?
}

/// Write `bytes` to `target` via a temp file in `dir`, fsync, and rename.
fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut temp = tempfile::NamedTempFile::new_in(dir).context(WriteSnafu { path: target })?;
    temp.as_file_mut()
        .write_all(bytes)
        .context(WriteSnafu { path: target })?;
    temp.as_file()
        .sync_all()
        .context(WriteSnafu { path: target })?;
    temp.persist(target)
        .map_err(|e| e.error)
        .context(WriteSnafu { path: target })?;
    Ok(())
}
