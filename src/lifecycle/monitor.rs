// ABOUTME: Status monitor driving a batch of deployments to a terminal outcome.
// ABOUTME: Polls the remote side on a fixed interval with per-record timeouts.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::remote::{OperationStatus, RemoteClient, SubStepError};
use crate::store::{DeploymentRecord, DeploymentStatus, DeploymentStore, StoreError, StoreErrorKind};
use crate::types::DeploymentId;

/// Terminal result of monitoring one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Succeeded,
    Failed,
    Canceled,
    TimedOut,
    /// The record was already torn down before monitoring started.
    Deleted,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Succeeded => "succeeded",
            Outcome::Failed => "failed",
            Outcome::Canceled => "canceled",
            Outcome::TimedOut => "timed-out",
            Outcome::Deleted => "deleted",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }

    /// Stored status written when this outcome is reached.
    pub fn stored_status(&self) -> DeploymentStatus {
        match self {
            Outcome::Succeeded => DeploymentStatus::Succeeded,
            Outcome::Failed | Outcome::Canceled | Outcome::TimedOut => DeploymentStatus::Failed,
            Outcome::Deleted => DeploymentStatus::Deleted,
        }
    }

    fn from_remote(status: &OperationStatus) -> Option<Self> {
        match status {
            OperationStatus::Succeeded => Some(Outcome::Succeeded),
            OperationStatus::Failed => Some(Outcome::Failed),
            OperationStatus::Canceled => Some(Outcome::Canceled),
            OperationStatus::Running(_) => None,
        }
    }

    fn from_stored(status: DeploymentStatus) -> Option<Self> {
        match status {
            DeploymentStatus::Succeeded => Some(Outcome::Succeeded),
            DeploymentStatus::Failed => Some(Outcome::Failed),
            DeploymentStatus::Deleted => Some(Outcome::Deleted),
            DeploymentStatus::Pending | DeploymentStatus::InProgress => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic detail attached to a failed outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "steps", rename_all = "kebab-case")]
pub enum ErrorDetails {
    Steps(Vec<SubStepError>),
    Unavailable,
}

impl fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorDetails::Unavailable => f.write_str("no detailed error information available"),
            ErrorDetails::Steps(steps) => {
                for (i, step) in steps.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(
                        f,
                        "{} ({}): [{}] {}",
                        step.resource_name, step.resource_type, step.status_code, step.message
                    )?;
                }
                Ok(())
            }
        }
    }
}

/// A record that reached its outcome during this run.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub outcome: Outcome,
    pub elapsed: chrono::Duration,
    /// Present for remote failures and cancellations.
    pub details: Option<ErrorDetails>,
    /// Whether the outcome came from the store without a remote call.
    pub from_store: bool,
}

/// One still-active record after a poll tick.
#[derive(Debug, Clone)]
pub struct ProgressRow {
    pub record: DeploymentRecord,
    pub remote_status: String,
    pub elapsed: chrono::Duration,
}

/// Receives monitor progress. Implemented by the live table and line log.
pub trait MonitorView: Send {
    fn started(&mut self, _total: usize) {}

    /// Called after each poll tick with the records still in flight.
    fn tick(&mut self, tick: u64, active: &[ProgressRow]);

    /// Called once per record when its outcome is known.
    fn resolved(&mut self, record: &DeploymentRecord, resolution: &Resolution);

    /// Called when monitoring stops early; `remaining` records stay active.
    fn interrupted(&mut self, _remaining: &[DeploymentRecord]) {}

    fn finished(&mut self, _report: &MonitorReport) {}
}

/// View that discards all progress.
#[derive(Debug, Default)]
pub struct SilentView;

impl MonitorView for SilentView {
    fn tick(&mut self, _tick: u64, _active: &[ProgressRow]) {}
    fn resolved(&mut self, _record: &DeploymentRecord, _resolution: &Resolution) {}
}

/// Result of [`Monitor::monitor_all`].
#[derive(Debug, Clone, Default)]
pub struct MonitorReport {
    pub outcomes: HashMap<DeploymentId, Outcome>,
    /// Records left active because monitoring was interrupted.
    pub interrupted: Vec<DeploymentId>,
    /// Number of poll ticks performed.
    pub ticks: u64,
}

impl MonitorReport {
    pub fn outcome(&self, id: &DeploymentId) -> Option<Outcome> {
        self.outcomes.get(id).copied()
    }

    pub fn was_interrupted(&self) -> bool {
        !self.interrupted.is_empty()
    }

    /// Whether every monitored record succeeded.
    pub fn all_succeeded(&self) -> bool {
        !self.was_interrupted() && self.outcomes.values().all(Outcome::is_success)
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.values().filter(|o| **o == outcome).count()
    }
}

/// Polling parameters.
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    /// Age after which an unfinished record is declared failed.
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Maximum status queries in flight per tick.
    pub max_concurrent_polls: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30 * 60),
            poll_interval: Duration::from_secs(30),
            max_concurrent_polls: 4,
        }
    }
}

/// Drives deployments to terminal outcomes.
pub struct Monitor<'a, R: ?Sized, S: ?Sized> {
    remote: &'a R,
    store: &'a S,
    settings: MonitorSettings,
}

impl<'a, R, S> Monitor<'a, R, S>
where
    R: RemoteClient + ?Sized,
    S: DeploymentStore + ?Sized,
{
    pub fn new(remote: &'a R, store: &'a S, settings: MonitorSettings) -> Self {
        Self {
            remote,
            store,
            settings,
        }
    }

    /// Poll every record until it reaches an outcome, or until `shutdown` resolves.
    ///
    /// Records already terminal in the store resolve without a remote call.
    /// Each tick checks timeouts, queries the rest, and writes terminal
    /// statuses back to the store before sleeping. On shutdown, records
    /// still in flight keep their stored status and are listed in
    /// [`MonitorReport::interrupted`].
    pub async fn monitor_all<V, F>(
        &self,
        records: Vec<DeploymentRecord>,
        view: &mut V,
        shutdown: F,
    ) -> Result<MonitorReport, StoreError>
    where
        V: MonitorView + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut report = MonitorReport::default();
        view.started(records.len());

        let mut active = Vec::new();
        for record in records {
            let current = self.current(record).await?;
            match Outcome::from_stored(current.status) {
                Some(outcome) => {
                    let resolution = Resolution {
                        outcome,
                        elapsed: Utc::now() - current.created_at,
                        details: None,
                        from_store: true,
                    };
                    view.resolved(&current, &resolution);
                    report.outcomes.insert(current.id.clone(), outcome);
                }
                None => active.push(current),
            }
        }

        while !active.is_empty() {
            report.ticks += 1;
            let in_flight = active.clone();
            let next = tokio::select! {
                biased;
                result = self.tick(active, view, &mut report) => Some(result?),
                _ = &mut shutdown => None,
            };
            let Some(next) = next else {
                // Records resolved before the cut-off are already stored.
                let remaining: Vec<_> = in_flight
                    .into_iter()
                    .filter(|r| !report.outcomes.contains_key(&r.id))
                    .collect();
                interrupt(view, &mut report, &remaining);
                break;
            };
            active = next;

            if active.is_empty() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                _ = &mut shutdown => {
                    interrupt(view, &mut report, &active);
                    break;
                }
            }
        }

        view.finished(&report);
        Ok(report)
    }

    /// Latest stored version of `record`, or `record` itself if it was never stored.
    async fn current(&self, record: DeploymentRecord) -> Result<DeploymentRecord, StoreError> {
        match self.store.get(&record.id).await {
            Ok(stored) => Ok(stored),
            Err(e) if e.kind() == StoreErrorKind::NotFound => Ok(record),
            Err(e) => Err(e),
        }
    }

    async fn tick<V: MonitorView + ?Sized>(
        &self,
        active: Vec<DeploymentRecord>,
        view: &mut V,
        report: &mut MonitorReport,
    ) -> Result<Vec<DeploymentRecord>, StoreError> {
        let now = Utc::now();
        let timeout = chrono::Duration::from_std(self.settings.timeout)
            .unwrap_or(chrono::Duration::MAX);

        let (expired, to_poll): (Vec<_>, Vec<_>) = active
            .into_iter()
            .partition(|r| now - r.created_at > timeout);

        for record in expired {
            tracing::warn!(
                "deployment {} exceeded timeout of {}s",
                record.id.short(),
                self.settings.timeout.as_secs()
            );
            let resolution = Resolution {
                outcome: Outcome::TimedOut,
                elapsed: now - record.created_at,
                details: None,
                from_store: false,
            };
            self.resolve(record, resolution, view, report).await?;
        }

        let remote = self.remote;
        let polled: Vec<_> = stream::iter(to_poll)
            .map(|record| async move {
                let status = remote.status(&record.target, &record.operation).await;
                (record, status)
            })
            .buffer_unordered(self.settings.max_concurrent_polls.max(1))
            .collect()
            .await;

        let mut still_active = Vec::new();
        let mut rows = Vec::new();
        for (record, status) in polled {
            let elapsed = Utc::now() - record.created_at;
            match status {
                Ok(status) => match Outcome::from_remote(&status) {
                    Some(outcome) => {
                        let details = match outcome {
                            Outcome::Failed | Outcome::Canceled => {
                                Some(self.error_details(&record).await)
                            }
                            _ => None,
                        };
                        let resolution = Resolution {
                            outcome,
                            elapsed,
                            details,
                            from_store: false,
                        };
                        self.resolve(record, resolution, view, report).await?;
                    }
                    None => {
                        rows.push(ProgressRow {
                            record: record.clone(),
                            remote_status: status.to_string(),
                            elapsed,
                        });
                        still_active.push(record);
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        "status query for {} failed, retrying next tick: {e}",
                        record.id.short()
                    );
                    rows.push(ProgressRow {
                        record: record.clone(),
                        remote_status: "unknown".to_string(),
                        elapsed,
                    });
                    still_active.push(record);
                }
            }
        }

        rows.sort_by(|a, b| a.record.created_at.cmp(&b.record.created_at));
        view.tick(report.ticks, &rows);
        Ok(still_active)
    }

    async fn resolve<V: MonitorView + ?Sized>(
        &self,
        record: DeploymentRecord,
        resolution: Resolution,
        view: &mut V,
        report: &mut MonitorReport,
    ) -> Result<(), StoreError> {
        let record =
            persist_status(self.store, record, resolution.outcome.stored_status()).await?;
        view.resolved(&record, &resolution);
        report.outcomes.insert(record.id, resolution.outcome);
        Ok(())
    }

    async fn error_details(&self, record: &DeploymentRecord) -> ErrorDetails {
        match self
            .remote
            .sub_step_errors(&record.target, &record.operation)
            .await
        {
            Ok(steps) if !steps.is_empty() => ErrorDetails::Steps(steps),
            Ok(_) => ErrorDetails::Unavailable,
            Err(e) => {
                tracing::warn!(
                    "could not fetch error details for {}: {e}",
                    record.id.short()
                );
                ErrorDetails::Unavailable
            }
        }
    }
}

fn interrupt<V: MonitorView + ?Sized>(
    view: &mut V,
    report: &mut MonitorReport,
    remaining: &[DeploymentRecord],
) {
    tracing::info!("monitoring interrupted with {} deployment(s) in flight", remaining.len());
    view.interrupted(remaining);
    report.interrupted = remaining.iter().map(|r| r.id.clone()).collect();
}

/// Write `status` for `record`, inserting the record if the store has never seen it.
pub(crate) async fn persist_status<S: DeploymentStore + ?Sized>(
    store: &S,
    mut record: DeploymentRecord,
    status: DeploymentStatus,
) -> Result<DeploymentRecord, StoreError> {
    match store.update_status(&record.id, status).await {
        Ok(updated) => Ok(updated),
        Err(e) if e.kind() == StoreErrorKind::NotFound => {
            record.status = status;
            store.upsert(&record).await?;
            Ok(record)
        }
        Err(e) => Err(e),
    }
}
