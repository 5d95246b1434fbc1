// ABOUTME: Lifecycle orchestrator tying naming, submission, monitoring, and cleanup together.
// ABOUTME: Exposes single-step operations plus the end-to-end deploy run.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use super::cleanup::{
    CleanupAction, CleanupItemResult, CleanupOptions, CleanupSelector, CleanupSummary,
    select_by_id, teardown,
};
use super::error::{LifecycleError, SubmitFailure, classify_failure};
use super::guard::ManagedRegistry;
use super::monitor::{Monitor, MonitorReport, MonitorSettings, MonitorView, persist_status};
use super::naming::{NamePlanner, TagContext, target_tags};
use super::outputs::{ConnectionInfo, EndpointSpec};
use super::policy::{CleanupDecision, decide, filter_older_than_str};
use crate::diagnostics::{Diagnostics, Warning};
use crate::remote::{ManagedTag, ManagedTarget, OperationRequest, Outputs, RemoteClient, TargetSpec};
use crate::store::{
    CleanupPolicy, DeploymentRecord, DeploymentStatus, DeploymentStore, StoreError, TtlOutOfRange,
};
use crate::types::{DeploymentId, ScenarioName};

/// A named configuration variant to deploy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Scenario {
    pub name: ScenarioName,
    /// Parameter file submitted with the operation.
    pub parameters: PathBuf,
    /// Template override; the configured template is used when absent.
    #[serde(default)]
    pub template: Option<PathBuf>,
}

/// Settings the orchestrator needs, resolved from configuration.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub owner: String,
    pub region: String,
    pub template: PathBuf,
    pub names: NamePlanner,
    /// Lifetime of scheduled-policy deployments.
    pub scheduled_ttl: Duration,
    pub monitor: MonitorSettings,
    pub managed_tag: ManagedTag,
    pub endpoint: EndpointSpec,
    pub results_dir: PathBuf,
    /// Pause before re-checking a submission that failed with a known quirk.
    pub spurious_verify_delay: Duration,
    /// Value of the `launched-from` tag.
    pub launched_from: String,
}

/// Result of submitting one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    /// The call reported a known false failure but the operation exists.
    AcceptedAfterVerify,
    Rejected(SubmitFailure),
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, SubmitOutcome::Rejected(_))
    }
}

/// A scenario dropped before submission.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedScenario {
    pub scenario: ScenarioName,
    pub reason: String,
}

/// A submission the remote side rejected.
#[derive(Debug, Clone)]
pub struct RejectedSubmission {
    pub record: DeploymentRecord,
    pub failure: SubmitFailure,
}

/// Result of [`Orchestrator::submit_batch`].
#[derive(Debug, Clone, Default)]
pub struct SubmitReport {
    /// Records accepted by the remote side, now in progress.
    pub submitted: Vec<DeploymentRecord>,
    pub skipped: Vec<SkippedScenario>,
    pub rejected: Vec<RejectedSubmission>,
}

/// Connection info written for a succeeded deployment.
#[derive(Debug, Clone, Serialize)]
pub struct SavedConnection {
    pub id: DeploymentId,
    pub scenario: ScenarioName,
    pub uri: Option<String>,
    pub path: PathBuf,
}

/// Post-monitoring work: connection files and automatic cleanup.
#[derive(Debug, Clone, Default)]
pub struct Finalized {
    pub connections: Vec<SavedConnection>,
    pub cleanups: Vec<CleanupItemResult>,
}

/// Result of [`Orchestrator::run`].
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub submit: SubmitReport,
    pub monitor: MonitorReport,
    pub finalized: Finalized,
}

impl RunReport {
    /// Whether any scenario, deployment, or automatic cleanup failed.
    pub fn has_failures(&self) -> bool {
        !self.submit.skipped.is_empty()
            || !self.submit.rejected.is_empty()
            || !self.monitor.all_succeeded()
            || self
                .finalized
                .cleanups
                .iter()
                .any(|c| c.action.is_failure())
    }
}

/// Coordinates remote calls and store updates for deployment lifecycles.
pub struct Orchestrator<'a, R: ?Sized, S: ?Sized> {
    remote: &'a R,
    store: &'a S,
    settings: &'a ControllerSettings,
}

impl<'a, R, S> Orchestrator<'a, R, S>
where
    R: RemoteClient + ?Sized,
    S: DeploymentStore + ?Sized,
{
    pub fn new(remote: &'a R, store: &'a S, settings: &'a ControllerSettings) -> Self {
        Self {
            remote,
            store,
            settings,
        }
    }

    /// Submit the operation for a stored `record` without waiting for it.
    ///
    /// Accepted submissions move the record to in-progress; rejected ones
    /// to failed. When the remote adapter flags the error as a known false
    /// failure, the operation's existence is re-checked after a short delay
    /// before deciding.
    pub async fn submit(
        &self,
        record: &DeploymentRecord,
        request: &OperationRequest,
    ) -> Result<SubmitOutcome, StoreError> {
        let error = match self
            .remote
            .create(&record.target, &record.operation, request)
            .await
        {
            Ok(()) => {
                self.mark(record, DeploymentStatus::InProgress).await?;
                return Ok(SubmitOutcome::Accepted);
            }
            Err(e) => e,
        };

        if self.remote.is_spurious_failure(&error) {
            tracing::info!(
                "submission of {} reported a known false failure, verifying",
                record.operation
            );
            tokio::time::sleep(self.settings.spurious_verify_delay).await;
            match self
                .remote
                .operation_exists(&record.target, &record.operation)
                .await
            {
                Ok(true) => {
                    self.mark(record, DeploymentStatus::InProgress).await?;
                    return Ok(SubmitOutcome::AcceptedAfterVerify);
                }
                Ok(false) => {
                    tracing::warn!("operation {} does not exist after submission", record.operation);
                }
                Err(e) => {
                    tracing::warn!("could not verify operation {}: {e}", record.operation);
                }
            }
        }

        let failure = classify_failure(error.raw_message());
        tracing::warn!("submission of {} failed: {}", record.operation, failure.summary);
        self.mark(record, DeploymentStatus::Failed).await?;
        Ok(SubmitOutcome::Rejected(failure))
    }

    /// Outputs of a completed operation, or `None` with a warning if unreadable.
    pub async fn extract_outputs(
        &self,
        record: &DeploymentRecord,
        diag: &mut Diagnostics,
    ) -> Option<Outputs> {
        match self.remote.outputs(&record.target, &record.operation).await {
            Ok(outputs) => Some(outputs),
            Err(e) => {
                diag.warn(Warning::outputs_unavailable(format!(
                    "could not read outputs of {}: {e}",
                    record.operation
                )));
                None
            }
        }
    }

    /// Create targets and submit operations for `scenarios`.
    ///
    /// A scenario whose target cannot be created is skipped and never stored.
    pub async fn submit_batch(
        &self,
        scenarios: &[Scenario],
        policy: CleanupPolicy,
        branch: &str,
        diag: &mut Diagnostics,
    ) -> Result<SubmitReport, LifecycleError> {
        let mut report = SubmitReport::default();
        let out_of_range = || TtlOutOfRange {
            seconds: i64::try_from(self.settings.scheduled_ttl.as_secs()).unwrap_or(i64::MAX),
        };
        let ttl = chrono::Duration::from_std(self.settings.scheduled_ttl)
            .map_err(|_| out_of_range())?;
        // Checked before anything is created remotely.
        if policy == CleanupPolicy::Scheduled && Utc::now().checked_add_signed(ttl).is_none() {
            return Err(out_of_range().into());
        }
        let tag_context = TagContext {
            owner: &self.settings.owner,
            managed_tag: &self.settings.managed_tag,
            launched_from: &self.settings.launched_from,
        };

        for scenario in scenarios {
            let now = Utc::now();
            let identity = self.settings.names.plan(&scenario.name, now);
            let mut record = DeploymentRecord::new(
                identity.id,
                identity.target,
                identity.operation,
                scenario.name.clone(),
                policy,
            )
            .with_branch(branch)
            .with_parameters_path(&scenario.parameters)
            .with_created_at(now)
            .with_ttl(ttl)?;

            let spec = TargetSpec {
                location: self.settings.region.clone(),
                tags: target_tags(&record, &tag_context),
            };
            if let Err(e) = self.remote.create_target(&record.target, &spec).await {
                diag.warn(Warning::scenario_skipped(format!(
                    "skipping {}: could not create {}: {e}",
                    scenario.name, record.target
                )));
                report.skipped.push(SkippedScenario {
                    scenario: scenario.name.clone(),
                    reason: e.to_string(),
                });
                continue;
            }

            self.store.upsert(&record).await?;

            let request = OperationRequest {
                template: scenario
                    .template
                    .clone()
                    .unwrap_or_else(|| self.settings.template.clone()),
                parameters: scenario.parameters.clone(),
            };
            match self.submit(&record, &request).await? {
                SubmitOutcome::Rejected(failure) => {
                    record.status = DeploymentStatus::Failed;
                    report.rejected.push(RejectedSubmission { record, failure });
                }
                SubmitOutcome::Accepted | SubmitOutcome::AcceptedAfterVerify => {
                    record.status = DeploymentStatus::InProgress;
                    report.submitted.push(record);
                }
            }
        }

        Ok(report)
    }

    /// Drive `records` to terminal outcomes. See [`Monitor::monitor_all`].
    pub async fn monitor_batch<V, F>(
        &self,
        records: Vec<DeploymentRecord>,
        view: &mut V,
        shutdown: F,
    ) -> Result<MonitorReport, StoreError>
    where
        V: MonitorView + ?Sized,
        F: Future<Output = ()>,
    {
        Monitor::new(self.remote, self.store, self.settings.monitor)
            .monitor_all(records, view, shutdown)
            .await
    }

    /// Records the monitor still has work for.
    pub async fn active(&self) -> Result<Vec<DeploymentRecord>, StoreError> {
        let mut records: Vec<_> = self
            .store
            .get_all()
            .await?
            .into_iter()
            .filter(|r| r.status.is_active())
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    /// Write connection info for succeeded records and apply each record's
    /// cleanup policy. Records without an outcome in `report` are left alone.
    pub async fn finalize(
        &self,
        records: &[DeploymentRecord],
        report: &MonitorReport,
        diag: &mut Diagnostics,
    ) -> Result<Finalized, StoreError> {
        let mut finalized = Finalized::default();
        let mut pending = Vec::new();

        for record in records {
            let Some(outcome) = report.outcome(&record.id) else {
                continue;
            };
            let current = self.store.get(&record.id).await?;
            if outcome.is_success()
                && let Some(saved) = self.save_connection(&current, diag).await
            {
                finalized.connections.push(saved);
            }
            let decision = decide(&current, Utc::now(), None);
            pending.push((current, decision));
        }

        let registry = if pending.iter().any(|(_, d)| d.should_cleanup) {
            Some(self.managed_registry(diag).await)
        } else {
            None
        };

        for (record, decision) in pending {
            let item = match &registry {
                Some(registry) => {
                    teardown(
                        self.remote,
                        self.store,
                        &record,
                        decision,
                        registry,
                        CleanupOptions::default(),
                        diag,
                    )
                    .await?
                }
                None => CleanupItemResult::new(&record, decision, CleanupAction::Skipped),
            };
            finalized.cleanups.push(item);
        }

        Ok(finalized)
    }

    /// End-to-end pass: submit, monitor, save connection info, auto-clean.
    pub async fn run<V, F>(
        &self,
        scenarios: &[Scenario],
        policy: CleanupPolicy,
        branch: &str,
        view: &mut V,
        shutdown: F,
        diag: &mut Diagnostics,
    ) -> Result<RunReport, LifecycleError>
    where
        V: MonitorView + ?Sized,
        F: Future<Output = ()>,
    {
        let submit = self.submit_batch(scenarios, policy, branch, diag).await?;
        if submit.submitted.is_empty() {
            return Ok(RunReport {
                submit,
                ..RunReport::default()
            });
        }

        let monitor = self
            .monitor_batch(submit.submitted.clone(), view, shutdown)
            .await?;
        let finalized = self.finalize(&submit.submitted, &monitor, diag).await?;

        Ok(RunReport {
            submit,
            monitor,
            finalized,
        })
    }

    /// Tear down the selected records, subject to policy and the managed gate.
    pub async fn cleanup_batch(
        &self,
        selector: &CleanupSelector,
        options: CleanupOptions,
        diag: &mut Diagnostics,
    ) -> Result<CleanupSummary, LifecycleError> {
        let records = self.store.get_all().await?;
        let now = Utc::now();

        let mut candidates = match selector {
            CleanupSelector::ById(query) => vec![select_by_id(&records, query)?.clone()],
            CleanupSelector::All => records
                .into_iter()
                .filter(|r| r.status != DeploymentStatus::Deleted)
                .collect(),
            CleanupSelector::OlderThan(age) => filter_older_than_str(&records, age, now, diag),
        };
        candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut summary = CleanupSummary::default();
        if candidates.is_empty() {
            return Ok(summary);
        }

        let registry = self.managed_registry(diag).await;
        for record in &candidates {
            let decision = if options.force {
                CleanupDecision::forced(record)
            } else {
                decide(record, now, None)
            };
            let item = teardown(
                self.remote,
                self.store,
                record,
                decision,
                &registry,
                options,
                diag,
            )
            .await?;
            summary.push(item);
        }

        Ok(summary)
    }

    /// Stored records, newest first. Deleted records only when asked for.
    pub async fn status(&self, include_deleted: bool) -> Result<Vec<DeploymentRecord>, StoreError> {
        let mut records: Vec<_> = self
            .store
            .get_all()
            .await?
            .into_iter()
            .filter(|r| include_deleted || r.status != DeploymentStatus::Deleted)
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Managed targets that exist remotely but have no record in the store.
    pub async fn orphans(&self) -> Result<Vec<ManagedTarget>, LifecycleError> {
        let managed = self.remote.list_managed(&self.settings.managed_tag).await?;
        let known: HashSet<String> = self
            .store
            .get_all()
            .await?
            .into_iter()
            .map(|r| r.target.into_inner())
            .collect();

        let mut orphans: Vec<_> = managed
            .into_iter()
            .filter(|t| !known.contains(&t.name))
            .collect();
        orphans.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(orphans)
    }

    async fn mark(
        &self,
        record: &DeploymentRecord,
        status: DeploymentStatus,
    ) -> Result<DeploymentRecord, StoreError> {
        persist_status(self.store, record.clone(), status).await
    }

    async fn managed_registry(&self, diag: &mut Diagnostics) -> ManagedRegistry {
        let registry = ManagedRegistry::fetch(self.remote, &self.settings.managed_tag).await;
        if !registry.is_available() {
            diag.warn(Warning::registry_unavailable(format!(
                "could not list targets tagged {}; unforced teardown will be refused",
                self.settings.managed_tag
            )));
        }
        registry
    }

    async fn save_connection(
        &self,
        record: &DeploymentRecord,
        diag: &mut Diagnostics,
    ) -> Option<SavedConnection> {
        let outputs = self.extract_outputs(record, diag).await?;
        let (info, problem) =
            ConnectionInfo::from_outputs(record, outputs, &self.settings.endpoint, Utc::now());
        if let Some(problem) = problem {
            diag.warn(Warning::connection_info(format!(
                "no client endpoint for {}: {problem}",
                record.scenario
            )));
        }

        match info.persist(&self.settings.results_dir).await {
            Ok(path) => Some(SavedConnection {
                id: record.id.clone(),
                scenario: record.scenario.clone(),
                uri: info.uri,
                path,
            }),
            Err(e) => {
                diag.warn(Warning::connection_info(format!(
                    "could not save connection info for {}: {e}",
                    record.scenario
                )));
                None
            }
        }
    }
}
