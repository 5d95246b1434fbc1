// ABOUTME: Cleanup policy engine: pure decisions on whether to tear a deployment down.
// ABOUTME: Also selects records older than an age threshold.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::diagnostics::{Diagnostics, Warning};
use crate::store::{CleanupPolicy, DeploymentRecord, DeploymentStatus, TestStatus};
use crate::types::AgeThreshold;

/// Verdict of the policy engine for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupDecision {
    pub should_cleanup: bool,
    pub reason: String,
    pub policy: CleanupPolicy,
}

impl CleanupDecision {
    fn cleanup(policy: CleanupPolicy, reason: impl Into<String>) -> Self {
        Self {
            should_cleanup: true,
            reason: reason.into(),
            policy,
        }
    }

    fn keep(policy: CleanupPolicy, reason: impl Into<String>) -> Self {
        Self {
            should_cleanup: false,
            reason: reason.into(),
            policy,
        }
    }

    /// Decision used when the operator forces teardown regardless of policy.
    pub fn forced(record: &DeploymentRecord) -> Self {
        if record.status == DeploymentStatus::Deleted {
            return Self::keep(record.cleanup_policy, "already deleted");
        }
        Self::cleanup(record.cleanup_policy, "force flag specified")
    }
}

/// Decide whether `record` should be torn down at `now`.
///
/// `policy_override` replaces the record's own policy for this evaluation only.
/// Deleted records are never selected, whatever the policy.
pub fn decide(
    record: &DeploymentRecord,
    now: DateTime<Utc>,
    policy_override: Option<CleanupPolicy>,
) -> CleanupDecision {
    let policy = policy_override.unwrap_or(record.cleanup_policy);

    if record.status == DeploymentStatus::Deleted {
        return CleanupDecision::keep(policy, "already deleted");
    }

    match policy {
        CleanupPolicy::Manual => CleanupDecision::keep(
            policy,
            "manual policy requires an explicit cleanup command",
        ),
        CleanupPolicy::Immediate => CleanupDecision::cleanup(policy, "immediate policy"),
        CleanupPolicy::OnSuccess => decide_on_success(record, policy),
        CleanupPolicy::Scheduled => decide_scheduled(record, now, policy),
    }
}

fn decide_on_success(record: &DeploymentRecord, policy: CleanupPolicy) -> CleanupDecision {
    if record.status == DeploymentStatus::Failed {
        return CleanupDecision::keep(policy, "deployment failed; kept for debugging");
    }
    match record.test_status {
        Some(TestStatus::Passed) => CleanupDecision::cleanup(policy, "tests passed"),
        Some(TestStatus::Failed) => {
            CleanupDecision::keep(policy, "tests failed; kept for debugging")
        }
        Some(TestStatus::NotRun) | None => {
            CleanupDecision::keep(policy, "tests not run yet; waiting for results")
        }
    }
}

fn decide_scheduled(
    record: &DeploymentRecord,
    now: DateTime<Utc>,
    policy: CleanupPolicy,
) -> CleanupDecision {
    let Some(expires_at) = record.expires_at else {
        return CleanupDecision::keep(policy, "no expiration set");
    };

    if now >= expires_at {
        CleanupDecision::cleanup(policy, format!("expired at {}", expires_at.to_rfc3339()))
    } else {
        let remaining = (expires_at - now).num_seconds() as f64 / 3600.0;
        CleanupDecision::keep(
            policy,
            format!("not expired yet ({remaining:.1} hours remaining)"),
        )
    }
}

/// Records created strictly before `now - threshold`, in input order.
///
/// A cutoff before the earliest representable date selects nothing.
pub fn filter_older_than(
    records: &[DeploymentRecord],
    threshold: AgeThreshold,
    now: DateTime<Utc>,
) -> Vec<DeploymentRecord> {
    let Some(cutoff) = now.checked_sub_signed(threshold.as_duration()) else {
        return Vec::new();
    };
    records
        .iter()
        .filter(|r| r.created_at < cutoff)
        .cloned()
        .collect()
}

/// Like [`filter_older_than`], but parses the threshold first.
///
/// An unparseable threshold selects nothing and leaves a warning in `diag`.
pub fn filter_older_than_str(
    records: &[DeploymentRecord],
    threshold: &str,
    now: DateTime<Utc>,
    diag: &mut Diagnostics,
) -> Vec<DeploymentRecord> {
    match AgeThreshold::parse(threshold) {
        Ok(parsed) if now.checked_sub_signed(parsed.as_duration()).is_none() => {
            diag.warn(Warning::invalid_age_filter(format!(
                "age threshold '{parsed}' reaches past the earliest representable date; \
                 no deployments selected"
            )));
            Vec::new()
        }
        Ok(parsed) => filter_older_than(records, parsed, now),
        Err(e) => {
            diag.warn(Warning::invalid_age_filter(format!(
                "{e}; no deployments selected"
            )));
            Vec::new()
        }
    }
}
