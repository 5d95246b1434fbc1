// ABOUTME: Deployment lifecycle: naming, submission, monitoring, and cleanup policy.
// ABOUTME: Everything here talks to the remote side only through RemoteClient.

mod cleanup;
mod error;
mod guard;
mod monitor;
mod naming;
mod orchestrator;
mod outputs;
mod policy;

pub use cleanup::{
    CleanupAction, CleanupItemResult, CleanupOptions, CleanupSelector, CleanupSummary,
    select_by_id,
};
pub use error::{FailureCategory, LifecycleError, SubmitFailure, classify_failure};
pub use guard::{GateVerdict, ManagedRegistry, RefusalReason, SafetyRefusal};
pub use monitor::{
    ErrorDetails, Monitor, MonitorReport, MonitorSettings, MonitorView, Outcome, ProgressRow,
    Resolution, SilentView,
};
pub use naming::{
    DeploymentIdentity, MAX_OPERATION_NAME, MAX_TARGET_NAME, NamePlanner, TagContext,
    local_hostname, target_tags, timestamp,
};
pub use orchestrator::{
    ControllerSettings, Finalized, Orchestrator, RejectedSubmission, RunReport, SavedConnection,
    Scenario, SkippedScenario, SubmitOutcome, SubmitReport,
};
pub use outputs::{ConnectionInfo, EndpointError, EndpointSpec, output_value, resolve_endpoint};
pub use policy::{CleanupDecision, decide, filter_older_than, filter_older_than_str};
