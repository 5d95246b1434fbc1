// ABOUTME: Command module aggregator for the ephem CLI.
// ABOUTME: Re-exports deploy, monitor, status, cleanup, and test-result handlers.

mod cleanup;
mod context;
mod deploy;
mod monitor;
mod status;
mod test_result;

pub use cleanup::{CleanupArgs, cleanup};
pub use context::Context;
pub use deploy::{DeployArgs, deploy};
pub use monitor::monitor;
pub use status::status;
pub use test_result::test_result;

use ephem::diagnostics::Diagnostics;
use ephem::lifecycle::{CleanupAction, CleanupItemResult, Finalized};
use ephem::output::Output;

/// Resolves on Ctrl-C. Never resolves if the signal handler cannot be installed.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Print collected warnings.
fn emit_warnings(output: &Output, diag: &Diagnostics) {
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }
}

fn cleanup_line(item: &CleanupItemResult) -> String {
    let detail = match &item.action {
        CleanupAction::Refused(refusal) => refusal.to_string(),
        CleanupAction::Failed { error } => error.clone(),
        _ => item.decision.reason.clone(),
    };
    format!(
        "  {} [{}] {}: {} ({detail})",
        item.scenario,
        item.id.short(),
        item.target,
        item.action.label()
    )
}

/// Report connection files and automatic cleanups after monitoring.
fn report_finalized(output: &Output, finalized: &Finalized) {
    for saved in &finalized.connections {
        let uri = saved.uri.as_deref().unwrap_or("no endpoint");
        output.progress(&format!(
            "  connection info for {} ({uri}): {}",
            saved.scenario,
            saved.path.display()
        ));
        output.event("connection-saved", saved);
    }
    for item in &finalized.cleanups {
        output.progress(&cleanup_line(item));
        output.event("auto-cleanup", item);
    }
}
