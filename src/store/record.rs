// ABOUTME: Persisted deployment record and its closed status/policy enums.
// ABOUTME: One record per provisioning attempt, keyed by deployment id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::types::{DeploymentId, OperationRef, ScenarioName, TargetRef};

/// Rule controlling whether a deployment's resources are torn down automatically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupPolicy {
    /// Tear down as soon as the deployment reaches a terminal state.
    Immediate,
    /// Tear down only when downstream tests passed.
    #[default]
    OnSuccess,
    /// Never tear down without an explicit command.
    Manual,
    /// Tear down once `expires_at` has passed.
    Scheduled,
}

impl CleanupPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupPolicy::Immediate => "immediate",
            CleanupPolicy::OnSuccess => "on-success",
            CleanupPolicy::Manual => "manual",
            CleanupPolicy::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for CleanupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CleanupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "immediate" => Ok(CleanupPolicy::Immediate),
            "on-success" | "on_success" => Ok(CleanupPolicy::OnSuccess),
            "manual" => Ok(CleanupPolicy::Manual),
            "scheduled" => Ok(CleanupPolicy::Scheduled),
            other => Err(format!(
                "unknown cleanup policy '{other}' (expected immediate, on-success, manual, or scheduled)"
            )),
        }
    }
}

/// Stored lifecycle status of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
    Deleted,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::InProgress => "in-progress",
            DeploymentStatus::Succeeded => "succeeded",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::Deleted => "deleted",
        }
    }

    /// Whether the monitor still has work to do for this status.
    pub fn is_active(&self) -> bool {
        matches!(self, DeploymentStatus::Pending | DeploymentStatus::InProgress)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result reported by the downstream validation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    Passed,
    Failed,
    NotRun,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::NotRun => "not-run",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "passed" => Ok(TestStatus::Passed),
            "failed" => Ok(TestStatus::Failed),
            "not-run" | "not_run" => Ok(TestStatus::NotRun),
            other => Err(format!(
                "unknown test status '{other}' (expected passed, failed, or not-run)"
            )),
        }
    }
}

/// One provisioning attempt.
///
/// Identity and provenance fields never change after creation. Only
/// `status` (controller) and `test_status` (validation runner) are mutated,
/// and always through a whole-record read-modify-write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: DeploymentId,
    pub target: TargetRef,
    pub operation: OperationRef,
    pub scenario: ScenarioName,
    pub branch: String,
    pub parameters_path: PathBuf,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub cleanup_policy: CleanupPolicy,
    pub status: DeploymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_status: Option<TestStatus>,
}

impl DeploymentRecord {
    /// Create a pending record.
    ///
    /// `expires_at` is only kept for [`CleanupPolicy::Scheduled`].
    pub fn new(
        id: DeploymentId,
        target: TargetRef,
        operation: OperationRef,
        scenario: ScenarioName,
        cleanup_policy: CleanupPolicy,
    ) -> Self {
        Self {
            id,
            target,
            operation,
            scenario,
            branch: "unknown".to_string(),
            parameters_path: PathBuf::new(),
            created_at: Utc::now(),
            expires_at: None,
            cleanup_policy,
            status: DeploymentStatus::Pending,
            test_status: None,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_parameters_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.parameters_path = path.into();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Set the expiry relative to `created_at`. Ignored unless the policy is scheduled.
    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Result<Self, TtlOutOfRange> {
        if self.cleanup_policy == CleanupPolicy::Scheduled {
            let expires_at = self
                .created_at
                .checked_add_signed(ttl)
                .ok_or(TtlOutOfRange {
                    seconds: ttl.num_seconds(),
                })?;
            self.expires_at = Some(expires_at);
        }
        Ok(self)
    }
}

/// An expiry that falls outside the representable date range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("time-to-live of {seconds}s puts the expiry out of range")]
pub struct TtlOutOfRange {
    pub seconds: i64,
}
