// ABOUTME: Test support utilities.
// ABOUTME: Provides a scripted RemoteClient fake, record builders, and tracing setup.

// Each test binary only uses some of these helpers, so allow dead_code.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ephem::lifecycle::{ControllerSettings, EndpointSpec, MonitorSettings, NamePlanner};
use ephem::remote::{
    ManagedTag, ManagedTarget, OperationRequest, OperationStatus, Outputs, RemoteClient,
    RemoteError, SubStepError, TargetSpec,
};
use ephem::store::{CleanupPolicy, DeploymentRecord, DeploymentStatus};
use ephem::types::{DeploymentId, OperationRef, ScenarioName, TargetRef};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Once;
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("ephem=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// One call received by [`FakeRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateTarget(String),
    Create(String),
    Exists(String),
    Status(String),
    Outputs(String),
    SubStepErrors(String),
    Destroy { target: String, wait: bool },
    ListManaged,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<Call>,
    failing_targets: Vec<String>,
    create_results: VecDeque<Result<(), RemoteError>>,
    exists: Option<Result<bool, RemoteError>>,
    statuses: Vec<(String, VecDeque<Result<OperationStatus, RemoteError>>)>,
    outputs: Option<Result<Outputs, RemoteError>>,
    sub_steps: Option<Result<Vec<SubStepError>, RemoteError>>,
    managed: HashSet<String>,
    list_error: Option<RemoteError>,
    destroy_failures: HashMap<String, RemoteError>,
    spurious_marker: Option<String>,
    stalled: Vec<String>,
}

/// Scripted in-memory control plane.
///
/// Unscripted calls succeed: operations report `Succeeded`, outputs are
/// empty, and every created target counts as managed.
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<FakeState>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target creation fails for targets whose name contains `pattern`.
    pub fn fail_target_creation(self, pattern: &str) -> Self {
        self.state.lock().failing_targets.push(pattern.to_string());
        self
    }

    /// Queue results for successive `create` calls.
    pub fn create_results(self, results: Vec<Result<(), RemoteError>>) -> Self {
        self.state.lock().create_results.extend(results);
        self
    }

    pub fn exists(self, result: Result<bool, RemoteError>) -> Self {
        self.state.lock().exists = Some(result);
        self
    }

    /// Status sequence for operations whose name contains `pattern`.
    /// The last entry repeats once the sequence is exhausted.
    pub fn statuses(self, pattern: &str, seq: Vec<Result<OperationStatus, RemoteError>>) -> Self {
        self.state
            .lock()
            .statuses
            .push((pattern.to_string(), seq.into_iter().collect()));
        self
    }

    pub fn outputs(self, result: Result<Outputs, RemoteError>) -> Self {
        self.state.lock().outputs = Some(result);
        self
    }

    pub fn sub_steps(self, result: Result<Vec<SubStepError>, RemoteError>) -> Self {
        self.state.lock().sub_steps = Some(result);
        self
    }

    pub fn managed(self, names: &[&str]) -> Self {
        self.state
            .lock()
            .managed
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn list_managed_fails(self, error: RemoteError) -> Self {
        self.state.lock().list_error = Some(error);
        self
    }

    pub fn fail_destroy(self, target: &str, error: RemoteError) -> Self {
        self.state
            .lock()
            .destroy_failures
            .insert(target.to_string(), error);
        self
    }

    /// Status queries for operations whose name contains `pattern` never return.
    pub fn stall(self, pattern: &str) -> Self {
        self.state.lock().stalled.push(pattern.to_string());
        self
    }

    /// Errors containing `marker` are reported as known false failures.
    pub fn spurious_marker(self, marker: &str) -> Self {
        self.state.lock().spurious_marker = Some(marker.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn status_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Status(_)))
            .count()
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Destroy { target, .. } => Some(target),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }
}

#[async_trait]
impl RemoteClient for FakeRemote {
    async fn create_target(
        &self,
        target: &TargetRef,
        _spec: &TargetSpec,
    ) -> Result<(), RemoteError> {
        self.record(Call::CreateTarget(target.to_string()));
        let mut state = self.state.lock();
        if state
            .failing_targets
            .iter()
            .any(|p| target.as_str().contains(p.as_str()))
        {
            return Err(RemoteError::Rejected(format!(
                "cannot create {target}"
            )));
        }
        state.managed.insert(target.to_string());
        Ok(())
    }

    async fn create(
        &self,
        _target: &TargetRef,
        operation: &OperationRef,
        _request: &OperationRequest,
    ) -> Result<(), RemoteError> {
        self.record(Call::Create(operation.to_string()));
        self.state.lock().create_results.pop_front().unwrap_or(Ok(()))
    }

    async fn operation_exists(
        &self,
        _target: &TargetRef,
        operation: &OperationRef,
    ) -> Result<bool, RemoteError> {
        self.record(Call::Exists(operation.to_string()));
        self.state.lock().exists.clone().unwrap_or(Ok(true))
    }

    async fn status(
        &self,
        _target: &TargetRef,
        operation: &OperationRef,
    ) -> Result<OperationStatus, RemoteError> {
        self.record(Call::Status(operation.to_string()));
        let stalled = self
            .state
            .lock()
            .stalled
            .iter()
            .any(|pattern| operation.as_str().contains(pattern.as_str()));
        if stalled {
            std::future::pending::<()>().await;
        }
        let mut state = self.state.lock();
        let scripted = state
            .statuses
            .iter_mut()
            .find(|(pattern, _)| operation.as_str().contains(pattern.as_str()));
        match scripted {
            Some((_, seq)) if seq.len() > 1 => seq.pop_front().unwrap_or(Ok(OperationStatus::Succeeded)),
            Some((_, seq)) => seq.front().cloned().unwrap_or(Ok(OperationStatus::Succeeded)),
            None => Ok(OperationStatus::Succeeded),
        }
    }

    async fn outputs(
        &self,
        _target: &TargetRef,
        operation: &OperationRef,
    ) -> Result<Outputs, RemoteError> {
        self.record(Call::Outputs(operation.to_string()));
        self.state.lock().outputs.clone().unwrap_or_else(|| Ok(Outputs::new()))
    }

    async fn sub_step_errors(
        &self,
        _target: &TargetRef,
        operation: &OperationRef,
    ) -> Result<Vec<SubStepError>, RemoteError> {
        self.record(Call::SubStepErrors(operation.to_string()));
        self.state.lock().sub_steps.clone().unwrap_or(Ok(Vec::new()))
    }

    async fn destroy(&self, target: &TargetRef, wait: bool) -> Result<(), RemoteError> {
        self.record(Call::Destroy {
            target: target.to_string(),
            wait,
        });
        match self.state.lock().destroy_failures.get(target.as_str()) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn list_managed(&self, _tag: &ManagedTag) -> Result<Vec<ManagedTarget>, RemoteError> {
        self.record(Call::ListManaged);
        let state = self.state.lock();
        if let Some(error) = &state.list_error {
            return Err(error.clone());
        }
        let mut names: Vec<_> = state.managed.iter().cloned().collect();
        names.sort();
        Ok(names.into_iter().map(|name| ManagedTarget { name }).collect())
    }

    fn is_spurious_failure(&self, error: &RemoteError) -> bool {
        match &self.state.lock().spurious_marker {
            Some(marker) => error.raw_message().contains(marker.as_str()),
            None => false,
        }
    }
}

/// A stored-shape record for `scenario` with predictable names.
pub fn record(id: &str, scenario: &str, policy: CleanupPolicy) -> DeploymentRecord {
    DeploymentRecord::new(
        DeploymentId::new(id),
        TargetRef::new(format!("ephem-test-{scenario}-{id}")),
        OperationRef::new(format!("ephem-deploy-{scenario}-{id}")),
        ScenarioName::new(scenario).unwrap(),
        policy,
    )
}

pub fn record_with(
    id: &str,
    scenario: &str,
    policy: CleanupPolicy,
    status: DeploymentStatus,
    created_at: DateTime<Utc>,
) -> DeploymentRecord {
    let mut r = record(id, scenario, policy).with_created_at(created_at);
    r.status = status;
    r
}

/// Monitor settings that never sleep long in tests.
pub fn fast_monitor() -> MonitorSettings {
    MonitorSettings {
        timeout: Duration::from_secs(30 * 60),
        poll_interval: Duration::from_millis(5),
        max_concurrent_polls: 4,
    }
}

/// Controller settings writing results under `results_dir`.
pub fn settings(results_dir: &Path) -> ControllerSettings {
    ControllerSettings {
        owner: "qa@example.com".to_string(),
        region: "westeurope".to_string(),
        template: "infra/main.json".into(),
        names: NamePlanner::new("ephem-test", "ephem-deploy"),
        scheduled_ttl: Duration::from_secs(24 * 60 * 60),
        monitor: fast_monitor(),
        managed_tag: ManagedTag::default(),
        endpoint: EndpointSpec::default(),
        results_dir: results_dir.to_path_buf(),
        spurious_verify_delay: Duration::ZERO,
        launched_from: "test-host".to_string(),
    }
}
