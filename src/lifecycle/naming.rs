// ABOUTME: Identity generation for deployments: ids, target names, operation names.
// ABOUTME: Also builds the tag set attached to every target the controller creates.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::remote::ManagedTag;
use crate::store::{CleanupPolicy, DeploymentRecord};
use crate::types::{DeploymentId, OperationRef, ScenarioName, TargetRef};

/// Longest target name the control plane accepts.
pub const MAX_TARGET_NAME: usize = 90;
/// Longest operation name the control plane accepts.
pub const MAX_OPERATION_NAME: usize = 64;

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// The three identities of one provisioning attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentIdentity {
    pub id: DeploymentId,
    pub target: TargetRef,
    pub operation: OperationRef,
}

/// Derives names from configured prefixes.
#[derive(Debug, Clone)]
pub struct NamePlanner {
    resource_prefix: String,
    operation_prefix: String,
}

impl NamePlanner {
    pub fn new(resource_prefix: impl Into<String>, operation_prefix: impl Into<String>) -> Self {
        Self {
            resource_prefix: resource_prefix.into(),
            operation_prefix: operation_prefix.into(),
        }
    }

    /// Fresh identities for `scenario` created at `now`.
    pub fn plan(&self, scenario: &ScenarioName, now: DateTime<Utc>) -> DeploymentIdentity {
        let ts = timestamp(now);
        let slug = scenario.slug();
        DeploymentIdentity {
            id: DeploymentId::generate(),
            target: TargetRef::new(bounded_name(
                &self.resource_prefix,
                &slug,
                &ts,
                MAX_TARGET_NAME,
            )),
            operation: OperationRef::new(bounded_name(
                &self.operation_prefix,
                &slug,
                &ts,
                MAX_OPERATION_NAME,
            )),
        }
    }
}

/// Compact UTC timestamp used in names and result files.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// `{prefix}-{slug}-{ts}`, shortening only the slug to fit `max`.
fn bounded_name(prefix: &str, slug: &str, ts: &str, max: usize) -> String {
    let fixed = prefix.len() + ts.len() + 2;
    let room = max.saturating_sub(fixed);
    let slug = if slug.len() > room { &slug[..room] } else { slug };
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        format!("{prefix}-{ts}")
    } else {
        format!("{prefix}-{slug}-{ts}")
    }
}

/// Everything that goes into a target's tag set.
#[derive(Debug, Clone)]
pub struct TagContext<'a> {
    pub owner: &'a str,
    pub managed_tag: &'a ManagedTag,
    pub launched_from: &'a str,
}

/// Tags attached to the target hosting `record`.
pub fn target_tags(record: &DeploymentRecord, ctx: &TagContext<'_>) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    tags.insert("purpose".to_string(), "ephemeral-test".to_string());
    tags.insert("scenario".to_string(), record.scenario.to_string());
    tags.insert("branch".to_string(), record.branch.clone());
    tags.insert("created".to_string(), record.created_at.to_rfc3339());
    tags.insert("owner".to_string(), ctx.owner.to_string());
    tags.insert("deployment-id".to_string(), record.id.to_string());
    tags.insert(
        "cleanup-mode".to_string(),
        record.cleanup_policy.as_str().to_string(),
    );
    tags.insert("launched-from".to_string(), ctx.launched_from.to_string());
    if record.cleanup_policy == CleanupPolicy::Scheduled
        && let Some(expires_at) = record.expires_at
    {
        tags.insert("expires".to_string(), expires_at.to_rfc3339());
    }
    tags.insert(ctx.managed_tag.key.clone(), ctx.managed_tag.value.clone());
    tags
}

/// Name of the local host, for the `launched-from` tag.
pub fn local_hostname() -> String {
    gethostname::gethostname()
        .into_string()
        .unwrap_or_else(|_| "unknown".to_string())
}
