// ABOUTME: Test-result command implementation.
// ABOUTME: Lets the validation step record its verdict on a deployment.

use super::Context;
use ephem::error::Result;
use ephem::lifecycle::select_by_id;
use ephem::store::{DeploymentStore, TestStatus};
use ephem::output::Output;

/// Record `status` as the test result of the deployment matching `query`.
pub async fn test_result(
    ctx: &Context,
    query: &str,
    status: TestStatus,
    output: &Output,
) -> Result<()> {
    let records = ctx.store.get_all().await?;
    let record = select_by_id(&records, query)?;
    let updated = ctx.store.update_test_status(&record.id, status).await?;

    output.event("test-result", &updated);
    output.success(&format!(
        "Recorded tests {} for {} ({})",
        status, updated.scenario, updated.id
    ));
    Ok(())
}
