// ABOUTME: Cleanup command implementation.
// ABOUTME: Selects deployments and tears them down through the policy and safety gate.

use super::{Context, cleanup_line, emit_warnings};
use ephem::diagnostics::Diagnostics;
use ephem::error::{Error, Result};
use ephem::lifecycle::{CleanupOptions, CleanupSelector};
use ephem::output::Output;

pub struct CleanupArgs {
    pub selector: CleanupSelector,
    pub force: bool,
    pub dry_run: bool,
    pub wait: bool,
}

/// Tear down the selected deployments.
pub async fn cleanup(ctx: &Context, args: CleanupArgs, mut output: Output) -> Result<()> {
    output.start_timer();
    let mut diag = Diagnostics::default();
    let options = CleanupOptions {
        force: args.force,
        dry_run: args.dry_run,
        wait: args.wait,
    };

    if options.force {
        output.warning("--force ignores cleanup policies and the managed-tag safety check");
    }

    let summary = ctx
        .orchestrator()
        .cleanup_batch(&args.selector, options, &mut diag)
        .await?;

    let prefix = if options.dry_run { "[dry run] " } else { "" };
    for item in &summary.results {
        output.progress(&format!("{prefix}{}", cleanup_line(item)));
    }
    emit_warnings(&output, &diag);
    output.event("cleanup-finished", &summary);

    if summary.total_candidates == 0 {
        output.success("No deployments matched");
        return Ok(());
    }

    let done = if options.dry_run {
        format!("{} would be cleaned up", summary.would_clean_up)
    } else {
        format!("{} cleaned up", summary.cleaned_up)
    };
    let line = format!(
        "{prefix}{done}, {} skipped, {} refused, {} failed (of {})",
        summary.skipped, summary.refused, summary.failed, summary.total_candidates
    );

    if summary.has_failures() {
        output.result(&line);
        return Err(Error::BatchFailed {
            failed: summary.failed + summary.refused,
            total: summary.total_candidates,
        });
    }

    output.success(&line);
    Ok(())
}
