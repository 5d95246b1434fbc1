// ABOUTME: Deploy command implementation.
// ABOUTME: Runs submit, monitor, connection-info, and auto-cleanup for selected scenarios.

use super::{Context, emit_warnings, report_finalized, shutdown_signal};
use ephem::diagnostics::Diagnostics;
use ephem::error::{Error, Result};
use ephem::lifecycle::{Outcome, RunReport};
use ephem::output::{Output, select_view};
use ephem::store::CleanupPolicy;
use serde::Serialize;
use std::path::Path;
use tokio::process::Command;

pub struct DeployArgs {
    pub scenarios: Vec<String>,
    pub cleanup_policy: Option<CleanupPolicy>,
    pub branch: Option<String>,
    pub live: bool,
}

/// Deploy the selected scenarios end to end.
pub async fn deploy(ctx: &Context, args: DeployArgs, mut output: Output) -> Result<()> {
    output.start_timer();
    let scenarios = ctx.config.select_scenarios(&args.scenarios)?;
    let policy = args.cleanup_policy.unwrap_or(ctx.config.cleanup_policy);
    let branch = match args.branch.or_else(|| ctx.config.branch.clone()) {
        Some(branch) => branch,
        None => detect_branch(&ctx.root).await,
    };
    let mut diag = Diagnostics::default();

    output.progress(&format!(
        "Deploying {} scenario(s) to {} (cleanup policy: {policy}, branch: {branch})",
        scenarios.len(),
        ctx.config.region
    ));

    let orchestrator = ctx.orchestrator();
    let mut view = select_view(&output, args.live);
    let report = orchestrator
        .run(
            &scenarios,
            policy,
            &branch,
            view.as_mut(),
            shutdown_signal(),
            &mut diag,
        )
        .await?;
    drop(view);

    for rejected in &report.submit.rejected {
        output.error(&format!(
            "{}: {}",
            rejected.record.scenario, rejected.failure.summary
        ));
        tracing::debug!("{}", rejected.failure.detail);
    }
    report_finalized(&output, &report.finalized);
    emit_warnings(&output, &diag);

    let summary = DeploySummary::new(&report, scenarios.len());
    output.event("deploy-finished", &summary);

    if report.submit.submitted.is_empty() {
        return Err(Error::NothingSubmitted);
    }
    if report.has_failures() {
        return Err(Error::BatchFailed {
            failed: summary.total - summary.succeeded,
            total: summary.total,
        });
    }

    output.success(&format!(
        "{} of {} deployment(s) succeeded",
        summary.succeeded, summary.total
    ));
    Ok(())
}

#[derive(Serialize)]
struct DeploySummary {
    total: usize,
    submitted: usize,
    skipped: usize,
    rejected: usize,
    succeeded: usize,
    failed: usize,
    timed_out: usize,
    interrupted: usize,
}

impl DeploySummary {
    fn new(report: &RunReport, total: usize) -> Self {
        let monitor = &report.monitor;
        Self {
            total,
            submitted: report.submit.submitted.len(),
            skipped: report.submit.skipped.len(),
            rejected: report.submit.rejected.len(),
            succeeded: monitor.count(Outcome::Succeeded),
            failed: monitor.count(Outcome::Failed) + monitor.count(Outcome::Canceled),
            timed_out: monitor.count(Outcome::TimedOut),
            interrupted: monitor.interrupted.len(),
        }
    }
}

/// Current git branch of `dir`, or "unknown".
async fn detect_branch(dir: &Path) -> String {
    let output = Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(dir)
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => {
            let branch = String::from_utf8_lossy(&out.stdout).trim().to_string();
            if branch.is_empty() {
                "unknown".to_string()
            } else {
                branch
            }
        }
        Ok(_) | Err(_) => {
            tracing::debug!("could not detect git branch in {}", dir.display());
            "unknown".to_string()
        }
    }
}
