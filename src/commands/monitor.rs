// ABOUTME: Monitor command implementation.
// ABOUTME: Re-attaches to in-flight deployments and finishes their lifecycle.

use super::{Context, emit_warnings, report_finalized, shutdown_signal};
use ephem::diagnostics::Diagnostics;
use ephem::error::{Error, Result};
use ephem::output::{Output, select_view};

/// Resume monitoring every pending or in-progress deployment.
pub async fn monitor(ctx: &Context, live: bool, mut output: Output) -> Result<()> {
    output.start_timer();
    let orchestrator = ctx.orchestrator();
    let records = orchestrator.active().await?;

    if records.is_empty() {
        output.success("No deployments in flight");
        return Ok(());
    }

    let mut diag = Diagnostics::default();
    let mut view = select_view(&output, live);
    let report = orchestrator
        .monitor_batch(records.clone(), view.as_mut(), shutdown_signal())
        .await?;
    drop(view);

    let finalized = orchestrator.finalize(&records, &report, &mut diag).await?;
    report_finalized(&output, &finalized);
    emit_warnings(&output, &diag);

    let total = records.len();
    let succeeded = report.outcomes.values().filter(|o| o.is_success()).count();
    let cleanup_failures = finalized
        .cleanups
        .iter()
        .filter(|c| c.action.is_failure())
        .count();

    if succeeded < total || cleanup_failures > 0 {
        return Err(Error::BatchFailed {
            failed: (total - succeeded).max(cleanup_failures),
            total,
        });
    }

    output.success(&format!("{succeeded} of {total} deployment(s) succeeded"));
    Ok(())
}
