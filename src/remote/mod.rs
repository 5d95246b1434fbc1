// ABOUTME: Narrow interface to the cloud control plane that provisions test environments.
// ABOUTME: Defines the RemoteClient trait, its structured results, and bundled adapters.

mod az;
mod error;
mod quirks;

pub use az::AzCliClient;
pub use error::RemoteError;
pub use quirks::{QuirkDetector, ResponseConsumedQuirk};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::types::{OperationRef, TargetRef};

/// Raw output values of a completed operation, keyed by output name.
pub type Outputs = serde_json::Map<String, serde_json::Value>;

/// Current state of a remote operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    /// Still in flight; carries the provider's state name (e.g. `Running`, `Accepted`).
    Running(String),
    Succeeded,
    Failed,
    Canceled,
}

impl OperationStatus {
    /// Map a provider provisioning-state string onto the closed status set.
    pub fn from_provisioning_state(state: &str) -> Self {
        match state.trim() {
            "Succeeded" => OperationStatus::Succeeded,
            "Failed" => OperationStatus::Failed,
            "Canceled" | "Cancelled" => OperationStatus::Canceled,
            other => OperationStatus::Running(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::Running(_))
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Running(state) if state.is_empty() => f.write_str("Running"),
            OperationStatus::Running(state) => f.write_str(state),
            OperationStatus::Succeeded => f.write_str("Succeeded"),
            OperationStatus::Failed => f.write_str("Failed"),
            OperationStatus::Canceled => f.write_str("Canceled"),
        }
    }
}

/// One failed sub-step of a remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubStepError {
    pub resource_name: String,
    pub resource_type: String,
    pub status_code: String,
    pub message: String,
}

/// Tag identifying targets owned by this controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedTag {
    pub key: String,
    pub value: String,
}

impl Default for ManagedTag {
    fn default() -> Self {
        Self {
            key: "managed-by".to_string(),
            value: "ephem".to_string(),
        }
    }
}

impl fmt::Display for ManagedTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// A target returned by a managed-tag listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManagedTarget {
    pub name: String,
}

/// Where and how to create a target container.
#[derive(Debug, Clone, Default)]
pub struct TargetSpec {
    pub location: String,
    pub tags: BTreeMap<String, String>,
}

/// The artifacts a provisioning operation is submitted with.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub template: PathBuf,
    pub parameters: PathBuf,
}

/// Remote control-plane operations used by the lifecycle controller.
///
/// Implementations own every wire detail (command lines, HTTP, response
/// parsing). Calls are single round-trips; the controller decides when to
/// call again.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Create the container that will host a deployment's resources.
    async fn create_target(&self, target: &TargetRef, spec: &TargetSpec)
    -> Result<(), RemoteError>;

    /// Submit a provisioning operation without waiting for it to finish.
    async fn create(
        &self,
        target: &TargetRef,
        operation: &OperationRef,
        request: &OperationRequest,
    ) -> Result<(), RemoteError>;

    /// Whether the operation is known to the remote side.
    async fn operation_exists(
        &self,
        target: &TargetRef,
        operation: &OperationRef,
    ) -> Result<bool, RemoteError>;

    /// Current status of an operation.
    async fn status(
        &self,
        target: &TargetRef,
        operation: &OperationRef,
    ) -> Result<OperationStatus, RemoteError>;

    /// Output values of a completed operation.
    async fn outputs(
        &self,
        target: &TargetRef,
        operation: &OperationRef,
    ) -> Result<Outputs, RemoteError>;

    /// Failed sub-steps of an operation.
    async fn sub_step_errors(
        &self,
        target: &TargetRef,
        operation: &OperationRef,
    ) -> Result<Vec<SubStepError>, RemoteError>;

    /// Tear down a target and everything in it.
    async fn destroy(&self, target: &TargetRef, wait: bool) -> Result<(), RemoteError>;

    /// Targets carrying the given tag.
    async fn list_managed(&self, tag: &ManagedTag) -> Result<Vec<ManagedTarget>, RemoteError>;

    /// Whether `error` is a known false negative of this integration, i.e. the
    /// request may have been accepted even though the call reported failure.
    fn is_spurious_failure(&self, _error: &RemoteError) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisioning_states_map_to_closed_set() {
        assert_eq!(
            OperationStatus::from_provisioning_state("Succeeded"),
            OperationStatus::Succeeded
        );
        assert_eq!(
            OperationStatus::from_provisioning_state("Failed\n"),
            OperationStatus::Failed
        );
        assert_eq!(
            OperationStatus::from_provisioning_state("Canceled"),
            OperationStatus::Canceled
        );
        assert_eq!(
            OperationStatus::from_provisioning_state("Running"),
            OperationStatus::Running("Running".to_string())
        );
        assert!(!OperationStatus::from_provisioning_state("Accepted").is_terminal());
    }

    #[test]
    fn managed_tag_defaults() {
        assert_eq!(ManagedTag::default().to_string(), "managed-by=ephem");
    }
}
