// ABOUTME: Status command implementation.
// ABOUTME: Lists recorded deployments and, optionally, unrecorded managed environments.

use super::Context;
use chrono::Utc;
use ephem::error::Result;
use ephem::output::{Output, format_elapsed};
use ephem::store::DeploymentRecord;

/// Show recorded deployments, newest first.
pub async fn status(ctx: &Context, include_deleted: bool, orphans: bool, output: &Output) -> Result<()> {
    let orchestrator = ctx.orchestrator();

    if orphans {
        let orphans = orchestrator.orphans().await?;
        output.event("orphans", &orphans.iter().map(|t| t.name.as_str()).collect::<Vec<_>>());
        if orphans.is_empty() {
            output.result("No unrecorded managed environments");
        } else {
            output.result(&format!(
                "{} managed environment(s) without a local record:",
                orphans.len()
            ));
            for target in &orphans {
                output.result(&format!("  {}", target.name));
            }
        }
        return Ok(());
    }

    let records = orchestrator.status(include_deleted).await?;
    output.event("deployments", &records);

    if records.is_empty() {
        output.result("No deployments recorded");
        return Ok(());
    }

    for line in render_table(&records) {
        output.result(&line);
    }
    Ok(())
}

fn render_table(records: &[DeploymentRecord]) -> Vec<String> {
    let now = Utc::now();
    let scenario_width = records
        .iter()
        .map(|r| r.scenario.as_str().len())
        .max()
        .unwrap_or(0)
        .max("SCENARIO".len());

    let mut lines = vec![format!(
        "{:<8}  {:<scenario_width$}  {:<11}  {:<8}  {:<10}  {:<8}  TARGET",
        "ID", "SCENARIO", "STATUS", "TESTS", "POLICY", "AGE"
    )];
    for r in records {
        let tests = r.test_status.map(|t| t.as_str()).unwrap_or("-");
        lines.push(format!(
            "{:<8}  {:<scenario_width$}  {:<11}  {:<8}  {:<10}  {:<8}  {}",
            r.id.short(),
            r.scenario.as_str(),
            r.status.as_str(),
            tests,
            r.cleanup_policy.as_str(),
            format_elapsed(now - r.created_at),
            r.target
        ));
    }
    lines
}
