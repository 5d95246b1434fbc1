// ABOUTME: Integration tests for the deployment monitor.
// ABOUTME: Drives scripted remote statuses through poll ticks, timeouts, and interruption.

mod support;

use chrono::Utc;
use ephem::lifecycle::{
    ErrorDetails, Monitor, MonitorView, Outcome, ProgressRow, Resolution, SilentView,
};
use ephem::remote::{OperationStatus, RemoteError, SubStepError};
use ephem::store::{
    CleanupPolicy, DeploymentRecord, DeploymentStatus, DeploymentStore, MemoryDeploymentStore,
};
use ephem::types::DeploymentId;
use std::future;
use std::time::Duration;
use support::{Call, FakeRemote, fast_monitor, init_tracing, record_with};

/// View that keeps everything it is told.
#[derive(Default)]
struct RecordingView {
    ticks: Vec<usize>,
    resolved: Vec<(String, Resolution)>,
    interrupted: Vec<String>,
}

impl MonitorView for RecordingView {
    fn tick(&mut self, _tick: u64, active: &[ProgressRow]) {
        self.ticks.push(active.len());
    }

    fn resolved(&mut self, record: &DeploymentRecord, resolution: &Resolution) {
        self.resolved
            .push((record.id.to_string(), resolution.clone()));
    }

    fn interrupted(&mut self, remaining: &[DeploymentRecord]) {
        self.interrupted
            .extend(remaining.iter().map(|r| r.id.to_string()));
    }
}

async fn stored(store: &MemoryDeploymentStore, records: &[DeploymentRecord]) {
    for r in records {
        store.upsert(r).await.unwrap();
    }
}

fn in_progress(id: &str, scenario: &str) -> DeploymentRecord {
    record_with(
        id,
        scenario,
        CleanupPolicy::OnSuccess,
        DeploymentStatus::InProgress,
        Utc::now(),
    )
}

#[tokio::test]
async fn one_tick_resolves_expired_and_completed_records() {
    init_tracing();
    let remote = FakeRemote::new();
    let store = MemoryDeploymentStore::new();
    let old = record_with(
        "old",
        "standalone",
        CleanupPolicy::OnSuccess,
        DeploymentStatus::InProgress,
        Utc::now() - chrono::Duration::hours(2),
    );
    let records = vec![old, in_progress("a", "cluster"), in_progress("b", "replica")];
    stored(&store, &records).await;

    let monitor = Monitor::new(&remote, &store, fast_monitor());
    let report = monitor
        .monitor_all(records, &mut SilentView, future::pending())
        .await
        .unwrap();

    assert_eq!(report.ticks, 1);
    assert_eq!(remote.status_calls(), 2);
    assert_eq!(report.count(Outcome::TimedOut), 1);
    assert_eq!(report.count(Outcome::Succeeded), 2);
    assert!(!remote.calls().contains(&Call::Status(
        "ephem-deploy-standalone-old".to_string()
    )));

    let old = store.get(&DeploymentId::new("old")).await.unwrap();
    assert_eq!(old.status, DeploymentStatus::Failed);
    let a = store.get(&DeploymentId::new("a")).await.unwrap();
    assert_eq!(a.status, DeploymentStatus::Succeeded);
}

#[tokio::test]
async fn records_terminal_in_store_resolve_without_polling() {
    let remote = FakeRemote::new();
    let store = MemoryDeploymentStore::new();
    let stale = in_progress("done", "standalone");
    let mut current = stale.clone();
    current.status = DeploymentStatus::Succeeded;
    store.upsert(&current).await.unwrap();

    let mut view = RecordingView::default();
    let report = Monitor::new(&remote, &store, fast_monitor())
        .monitor_all(vec![stale], &mut view, future::pending())
        .await
        .unwrap();

    assert!(remote.calls().is_empty());
    assert_eq!(report.ticks, 0);
    assert_eq!(report.outcome(&DeploymentId::new("done")), Some(Outcome::Succeeded));
    assert!(view.resolved[0].1.from_store);
}

#[tokio::test]
async fn failed_operation_carries_sub_step_details() {
    let step = SubStepError {
        resource_name: "graph-vm".to_string(),
        resource_type: "Microsoft.Compute/virtualMachines".to_string(),
        status_code: "Conflict".to_string(),
        message: "SkuNotAvailable".to_string(),
    };
    let remote = FakeRemote::new()
        .statuses("broken", vec![Ok(OperationStatus::Failed)])
        .sub_steps(Ok(vec![step.clone()]));
    let store = MemoryDeploymentStore::new();
    let records = vec![in_progress("x", "broken")];
    stored(&store, &records).await;

    let mut view = RecordingView::default();
    let report = Monitor::new(&remote, &store, fast_monitor())
        .monitor_all(records, &mut view, future::pending())
        .await
        .unwrap();

    assert_eq!(report.outcome(&DeploymentId::new("x")), Some(Outcome::Failed));
    let (_, resolution) = &view.resolved[0];
    assert_eq!(resolution.details, Some(ErrorDetails::Steps(vec![step])));
    assert!(!report.all_succeeded());
}

#[tokio::test]
async fn unreadable_details_degrade_to_unavailable() {
    let remote = FakeRemote::new()
        .statuses("broken", vec![Ok(OperationStatus::Failed)])
        .sub_steps(Err(RemoteError::Rejected("AuthorizationFailed".to_string())));
    let store = MemoryDeploymentStore::new();
    let records = vec![in_progress("x", "broken")];
    stored(&store, &records).await;

    let mut view = RecordingView::default();
    Monitor::new(&remote, &store, fast_monitor())
        .monitor_all(records, &mut view, future::pending())
        .await
        .unwrap();

    let details = view.resolved[0].1.details.clone().unwrap();
    assert_eq!(details, ErrorDetails::Unavailable);
    assert_eq!(
        details.to_string(),
        "no detailed error information available"
    );
}

#[tokio::test]
async fn canceled_operation_is_stored_as_failed() {
    let remote = FakeRemote::new().statuses("gone", vec![Ok(OperationStatus::Canceled)]);
    let store = MemoryDeploymentStore::new();
    let records = vec![in_progress("c", "gone")];
    stored(&store, &records).await;

    let report = Monitor::new(&remote, &store, fast_monitor())
        .monitor_all(records, &mut SilentView, future::pending())
        .await
        .unwrap();

    assert_eq!(report.outcome(&DeploymentId::new("c")), Some(Outcome::Canceled));
    let c = store.get(&DeploymentId::new("c")).await.unwrap();
    assert_eq!(c.status, DeploymentStatus::Failed);
}

#[tokio::test]
async fn transient_query_error_keeps_record_active() {
    let remote = FakeRemote::new().statuses(
        "flaky",
        vec![
            Err(RemoteError::Transport("connection reset".to_string())),
            Ok(OperationStatus::Running("Running".to_string())),
            Ok(OperationStatus::Succeeded),
        ],
    );
    let store = MemoryDeploymentStore::new();
    let records = vec![in_progress("f", "flaky")];
    stored(&store, &records).await;

    let mut view = RecordingView::default();
    let report = Monitor::new(&remote, &store, fast_monitor())
        .monitor_all(records, &mut view, future::pending())
        .await
        .unwrap();

    assert_eq!(report.ticks, 3);
    assert_eq!(view.ticks, vec![1, 1, 0]);
    assert_eq!(report.outcome(&DeploymentId::new("f")), Some(Outcome::Succeeded));
}

#[tokio::test]
async fn shutdown_leaves_in_flight_records_untouched() {
    let remote = FakeRemote::new().statuses(
        "slow",
        vec![Ok(OperationStatus::Running("Running".to_string()))],
    );
    let store = MemoryDeploymentStore::new();
    let records = vec![in_progress("s", "slow"), in_progress("q", "quick")];
    stored(&store, &records).await;

    let mut view = RecordingView::default();
    let report = Monitor::new(&remote, &store, fast_monitor())
        .monitor_all(records, &mut view, future::ready(()))
        .await
        .unwrap();

    assert!(report.was_interrupted());
    assert_eq!(report.interrupted, vec![DeploymentId::new("s")]);
    assert_eq!(view.interrupted, vec!["s".to_string()]);
    assert_eq!(report.outcome(&DeploymentId::new("q")), Some(Outcome::Succeeded));

    let s = store.get(&DeploymentId::new("s")).await.unwrap();
    assert_eq!(s.status, DeploymentStatus::InProgress);
}

#[tokio::test]
async fn shutdown_during_a_tick_stops_without_waiting_for_it() {
    let remote = FakeRemote::new().stall("hung");
    let store = MemoryDeploymentStore::new();
    let records = vec![in_progress("h", "hung")];
    stored(&store, &records).await;

    let mut view = RecordingView::default();
    let report = tokio::time::timeout(
        Duration::from_secs(5),
        Monitor::new(&remote, &store, fast_monitor()).monitor_all(
            records,
            &mut view,
            tokio::time::sleep(Duration::from_millis(20)),
        ),
    )
    .await
    .expect("monitor should stop once shutdown fires")
    .unwrap();

    assert_eq!(report.ticks, 1);
    assert_eq!(report.interrupted, vec![DeploymentId::new("h")]);
    assert_eq!(view.interrupted, vec!["h".to_string()]);
    assert!(view.ticks.is_empty());

    let h = store.get(&DeploymentId::new("h")).await.unwrap();
    assert_eq!(h.status, DeploymentStatus::InProgress);
}

#[tokio::test]
async fn unstored_record_is_inserted_on_resolution() {
    let remote = FakeRemote::new();
    let store = MemoryDeploymentStore::new();

    Monitor::new(&remote, &store, fast_monitor())
        .monitor_all(
            vec![in_progress("n", "standalone")],
            &mut SilentView,
            future::pending(),
        )
        .await
        .unwrap();

    let n = store.get(&DeploymentId::new("n")).await.unwrap();
    assert_eq!(n.status, DeploymentStatus::Succeeded);
}
