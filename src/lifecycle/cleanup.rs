// ABOUTME: Cleanup batches: record selection, per-item teardown, and summaries.
// ABOUTME: Every destroy passes the policy decision and the managed-target gate first.

use serde::Serialize;

use super::error::LifecycleError;
use super::guard::{GateVerdict, ManagedRegistry, SafetyRefusal};
use super::policy::CleanupDecision;
use crate::diagnostics::{Diagnostics, Warning};
use crate::remote::RemoteClient;
use crate::store::{DeploymentRecord, DeploymentStatus, DeploymentStore, StoreError};
use crate::types::{DeploymentId, ScenarioName, TargetRef};

/// Which records a cleanup batch considers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupSelector {
    /// One record by exact id, unique prefix, or unique substring.
    ById(String),
    /// Every record not yet deleted.
    All,
    /// Records older than an age like `2h` or `3d`.
    OlderThan(String),
}

/// Flags for a cleanup batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupOptions {
    /// Bypass the policy decision and the managed-target gate.
    pub force: bool,
    /// Report what would happen without destroying anything.
    pub dry_run: bool,
    /// Wait for teardown to complete remotely.
    pub wait: bool,
}

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum CleanupAction {
    Deleted,
    WouldDelete,
    Skipped,
    Refused(SafetyRefusal),
    Failed { error: String },
}

impl CleanupAction {
    pub fn label(&self) -> &'static str {
        match self {
            CleanupAction::Deleted => "deleted",
            CleanupAction::WouldDelete => "would delete",
            CleanupAction::Skipped => "skipped",
            CleanupAction::Refused(_) => "refused",
            CleanupAction::Failed { .. } => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, CleanupAction::Refused(_) | CleanupAction::Failed { .. })
    }
}

/// Per-candidate cleanup result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupItemResult {
    pub id: DeploymentId,
    pub scenario: ScenarioName,
    pub target: TargetRef,
    pub decision: CleanupDecision,
    #[serde(flatten)]
    pub action: CleanupAction,
}

impl CleanupItemResult {
    pub fn new(record: &DeploymentRecord, decision: CleanupDecision, action: CleanupAction) -> Self {
        Self {
            id: record.id.clone(),
            scenario: record.scenario.clone(),
            target: record.target.clone(),
            decision,
            action,
        }
    }
}

/// Totals for a cleanup batch.
///
/// `total_candidates` always equals the sum of the other counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub total_candidates: usize,
    pub cleaned_up: usize,
    pub would_clean_up: usize,
    pub skipped: usize,
    pub refused: usize,
    pub failed: usize,
    pub results: Vec<CleanupItemResult>,
}

impl CleanupSummary {
    pub fn push(&mut self, item: CleanupItemResult) {
        self.total_candidates += 1;
        match item.action {
            CleanupAction::Deleted => self.cleaned_up += 1,
            CleanupAction::WouldDelete => self.would_clean_up += 1,
            CleanupAction::Skipped => self.skipped += 1,
            CleanupAction::Refused(_) => self.refused += 1,
            CleanupAction::Failed { .. } => self.failed += 1,
        }
        self.results.push(item);
    }

    /// Whether any candidate failed or was refused.
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.refused > 0
    }
}

/// Resolve `query` to exactly one record.
///
/// An exact id wins; otherwise a unique id prefix, then a unique substring.
pub fn select_by_id<'a>(
    records: &'a [DeploymentRecord],
    query: &str,
) -> Result<&'a DeploymentRecord, LifecycleError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(LifecycleError::NoMatch(String::new()));
    }
    if let Some(exact) = records.iter().find(|r| r.id.as_str() == query) {
        return Ok(exact);
    }

    let prefixed: Vec<_> = records
        .iter()
        .filter(|r| r.id.as_str().starts_with(query))
        .collect();
    let matches = if prefixed.is_empty() {
        records
            .iter()
            .filter(|r| r.id.as_str().contains(query))
            .collect()
    } else {
        prefixed
    };

    match matches.as_slice() {
        [] => Err(LifecycleError::NoMatch(query.to_string())),
        [only] => Ok(*only),
        many => Err(LifecycleError::Ambiguous {
            query: query.to_string(),
            candidates: many.iter().map(|r| r.id.to_string()).collect(),
        }),
    }
}

/// Carry out `decision` for `record`.
///
/// Store errors abort; remote failures are reported in the item result.
pub(crate) async fn teardown<R, S>(
    remote: &R,
    store: &S,
    record: &DeploymentRecord,
    decision: CleanupDecision,
    registry: &ManagedRegistry,
    options: CleanupOptions,
    diag: &mut Diagnostics,
) -> Result<CleanupItemResult, StoreError>
where
    R: RemoteClient + ?Sized,
    S: DeploymentStore + ?Sized,
{
    let action = if !decision.should_cleanup {
        CleanupAction::Skipped
    } else {
        match registry.check(&record.target, options.force) {
            GateVerdict::Refused(refusal) => {
                tracing::warn!("{refusal}");
                CleanupAction::Refused(refusal)
            }
            verdict => {
                if verdict == GateVerdict::ForcedUnmanaged {
                    diag.warn(Warning::forced(format!(
                        "destroying {} although it is not confirmed as managed",
                        record.target
                    )));
                }
                if options.dry_run {
                    CleanupAction::WouldDelete
                } else {
                    destroy(remote, store, record, options.wait).await?
                }
            }
        }
    };

    Ok(CleanupItemResult::new(record, decision, action))
}

async fn destroy<R, S>(
    remote: &R,
    store: &S,
    record: &DeploymentRecord,
    wait: bool,
) -> Result<CleanupAction, StoreError>
where
    R: RemoteClient + ?Sized,
    S: DeploymentStore + ?Sized,
{
    tracing::info!("destroying {} ({})", record.target, record.id.short());
    match remote.destroy(&record.target, wait).await {
        Ok(()) => {
            store
                .update_status(&record.id, DeploymentStatus::Deleted)
                .await?;
            Ok(CleanupAction::Deleted)
        }
        Err(e) => {
            tracing::warn!("failed to destroy {}: {e}", record.target);
            Ok(CleanupAction::Failed {
                error: e.to_string(),
            })
        }
    }
}
