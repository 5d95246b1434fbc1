// ABOUTME: RemoteClient adapter driving the Azure CLI (`az`) as a subprocess.
// ABOUTME: Arguments are passed as vectors; responses are parsed as JSON or TSV.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{
    ManagedTag, ManagedTarget, OperationRequest, OperationStatus, Outputs, QuirkDetector,
    RemoteClient, RemoteError, ResponseConsumedQuirk, SubStepError, TargetSpec,
};
use crate::types::{OperationRef, TargetRef};

const NOT_FOUND_MARKERS: &[&str] = &["DeploymentNotFound", "ResourceGroupNotFound", "could not be found"];
const THROTTLE_MARKERS: &[&str] = &["TooManyRequests", "(429)", "status code 429"];
const TRANSPORT_MARKERS: &[&str] = &["ConnectionError", "Connection aborted", "timed out"];

/// Drives the Azure CLI for resource groups and ARM deployments.
#[derive(Debug)]
pub struct AzCliClient {
    program: PathBuf,
    quirks: Vec<Box<dyn QuirkDetector>>,
}

impl Default for AzCliClient {
    fn default() -> Self {
        Self::new("az")
    }
}

impl AzCliClient {
    /// Create a client running the given `az` executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            quirks: vec![Box::new(ResponseConsumedQuirk)],
        }
    }

    /// Path of the CLI executable.
    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn run(&self, args: &[&str]) -> Result<String, RemoteError> {
        tracing::debug!("az {}", args.join(" "));

        let output = Command::new(&self.program)
            .args(args)
            .arg("--only-show-errors")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                RemoteError::Transport(format!("failed to run {}: {e}", self.program.display()))
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(classify_stderr(stderr))
        }
    }
}

fn classify_stderr(stderr: String) -> RemoteError {
    if THROTTLE_MARKERS.iter().any(|m| stderr.contains(m)) {
        RemoteError::Throttled(stderr)
    } else if TRANSPORT_MARKERS.iter().any(|m| stderr.contains(m)) {
        RemoteError::Transport(stderr)
    } else {
        RemoteError::Rejected(stderr)
    }
}

fn is_not_found(error: &RemoteError) -> bool {
    matches!(error, RemoteError::Rejected(msg) if NOT_FOUND_MARKERS.iter().any(|m| msg.contains(m)))
}

fn parse_outputs(stdout: &str) -> Result<Outputs, RemoteError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Outputs::new());
    }
    serde_json::from_str(trimmed).map_err(|e| RemoteError::Malformed(format!("outputs: {e}")))
}

#[derive(Deserialize)]
struct RawOperation {
    #[serde(default)]
    properties: RawOperationProperties,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOperationProperties {
    #[serde(default)]
    provisioning_state: String,
    #[serde(default)]
    status_code: Option<String>,
    #[serde(default)]
    status_message: Option<serde_json::Value>,
    #[serde(default)]
    target_resource: Option<RawTargetResource>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTargetResource {
    #[serde(default)]
    resource_name: Option<String>,
    #[serde(default)]
    resource_type: Option<String>,
}

fn parse_sub_step_errors(stdout: &str) -> Result<Vec<SubStepError>, RemoteError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let ops: Vec<RawOperation> = serde_json::from_str(trimmed)
        .map_err(|e| RemoteError::Malformed(format!("operation list: {e}")))?;

    Ok(ops
        .into_iter()
        .filter(|op| op.properties.provisioning_state == "Failed")
        .map(|op| {
            let props = op.properties;
            let (resource_name, resource_type) = props
                .target_resource
                .map(|t| (t.resource_name, t.resource_type))
                .unwrap_or((None, None));
            SubStepError {
                resource_name: resource_name.unwrap_or_else(|| "unknown".to_string()),
                resource_type: resource_type.unwrap_or_else(|| "unknown".to_string()),
                status_code: props.status_code.unwrap_or_else(|| "unknown".to_string()),
                message: status_message_text(props.status_message),
            }
        })
        .collect())
}

/// Pull the most specific message out of an ARM status message payload.
fn status_message_text(value: Option<serde_json::Value>) -> String {
    let Some(value) = value else {
        return "no message".to_string();
    };
    let error = value.get("error").unwrap_or(&value);
    if let Some(msg) = error.get("message").and_then(|m| m.as_str()) {
        return msg.to_string();
    }
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

fn parse_managed_targets(stdout: &str) -> Result<Vec<ManagedTarget>, RemoteError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).map_err(|e| RemoteError::Malformed(format!("group list: {e}")))
}

fn path_arg(path: &Path) -> Result<&str, RemoteError> {
    path.to_str()
        .ok_or_else(|| RemoteError::Rejected(format!("path is not valid UTF-8: {}", path.display())))
}

#[async_trait]
impl RemoteClient for AzCliClient {
    async fn create_target(
        &self,
        target: &TargetRef,
        spec: &TargetSpec,
    ) -> Result<(), RemoteError> {
        let tags: Vec<String> = spec.tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let mut args = vec![
            "group",
            "create",
            "--name",
            target.as_str(),
            "--location",
            spec.location.as_str(),
            "--output",
            "none",
        ];
        if !tags.is_empty() {
            args.push("--tags");
            args.extend(tags.iter().map(String::as_str));
        }
        self.run(&args).await.map(|_| ())
    }

    async fn create(
        &self,
        target: &TargetRef,
        operation: &OperationRef,
        request: &OperationRequest,
    ) -> Result<(), RemoteError> {
        let template = path_arg(&request.template)?;
        let parameters = format!("@{}", path_arg(&request.parameters)?);
        self.run(&[
            "deployment",
            "group",
            "create",
            "--resource-group",
            target.as_str(),
            "--name",
            operation.as_str(),
            "--template-file",
            template,
            "--parameters",
            parameters.as_str(),
            "--no-wait",
            "--output",
            "none",
        ])
        .await
        .map(|_| ())
    }

    async fn operation_exists(
        &self,
        target: &TargetRef,
        operation: &OperationRef,
    ) -> Result<bool, RemoteError> {
        let result = self
            .run(&[
                "deployment",
                "group",
                "show",
                "--resource-group",
                target.as_str(),
                "--name",
                operation.as_str(),
                "--query",
                "name",
                "--output",
                "tsv",
            ])
            .await;
        match result {
            Ok(stdout) => Ok(!stdout.trim().is_empty()),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn status(
        &self,
        target: &TargetRef,
        operation: &OperationRef,
    ) -> Result<OperationStatus, RemoteError> {
        let stdout = self
            .run(&[
                "deployment",
                "group",
                "show",
                "--resource-group",
                target.as_str(),
                "--name",
                operation.as_str(),
                "--query",
                "properties.provisioningState",
                "--output",
                "tsv",
            ])
            .await?;
        let state = stdout.trim();
        if state.is_empty() {
            return Err(RemoteError::Malformed(
                "empty provisioning state".to_string(),
            ));
        }
        Ok(OperationStatus::from_provisioning_state(state))
    }

    async fn outputs(
        &self,
        target: &TargetRef,
        operation: &OperationRef,
    ) -> Result<Outputs, RemoteError> {
        let stdout = self
            .run(&[
                "deployment",
                "group",
                "show",
                "--resource-group",
                target.as_str(),
                "--name",
                operation.as_str(),
                "--query",
                "properties.outputs",
                "--output",
                "json",
            ])
            .await?;
        parse_outputs(&stdout)
    }

    async fn sub_step_errors(
        &self,
        target: &TargetRef,
        operation: &OperationRef,
    ) -> Result<Vec<SubStepError>, RemoteError> {
        let stdout = self
            .run(&[
                "deployment",
                "operation",
                "group",
                "list",
                "--resource-group",
                target.as_str(),
                "--name",
                operation.as_str(),
                "--output",
                "json",
            ])
            .await?;
        parse_sub_step_errors(&stdout)
    }

    async fn destroy(&self, target: &TargetRef, wait: bool) -> Result<(), RemoteError> {
        let mut args = vec!["group", "delete", "--name", target.as_str(), "--yes"];
        if !wait {
            args.push("--no-wait");
        }
        self.run(&args).await.map(|_| ())
    }

    async fn list_managed(&self, tag: &ManagedTag) -> Result<Vec<ManagedTarget>, RemoteError> {
        let filter = tag.to_string();
        let stdout = self
            .run(&[
                "group",
                "list",
                "--tag",
                filter.as_str(),
                "--query",
                "[].{name:name}",
                "--output",
                "json",
            ])
            .await?;
        parse_managed_targets(&stdout)
    }

    fn is_spurious_failure(&self, error: &RemoteError) -> bool {
        match self.quirks.iter().find(|q| q.matches(error)) {
            Some(quirk) => {
                tracing::debug!("error matches known quirk '{}'", quirk.name());
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_classification() {
        assert!(matches!(
            classify_stderr("ERROR: (TooManyRequests) slow down".into()),
            RemoteError::Throttled(_)
        ));
        assert!(matches!(
            classify_stderr("ERROR: ConnectionError: reset by peer".into()),
            RemoteError::Transport(_)
        ));
        assert!(matches!(
            classify_stderr("ERROR: (QuotaExceeded) out of cores".into()),
            RemoteError::Rejected(_)
        ));
        assert!(matches!(
            classify_stderr("ERROR: Operation returned an invalid status code 429".into()),
            RemoteError::Throttled(_)
        ));
    }

    #[test]
    fn digits_inside_names_are_not_throttling() {
        let stderr = "ERROR: (DeploymentNotFound) Deployment \
                      'ephem-deploy-standalone-20250116-142900' could not be found.";
        let error = classify_stderr(stderr.into());
        assert!(matches!(error, RemoteError::Rejected(_)));
        assert!(is_not_found(&error));

        assert!(matches!(
            classify_stderr("ERROR: (QuotaExceeded) subscription 4291a7e0-0000 is out of cores".into()),
            RemoteError::Rejected(_)
        ));
    }

    #[test]
    fn not_found_detection() {
        assert!(is_not_found(&RemoteError::Rejected(
            "ERROR: (DeploymentNotFound) Deployment 'x' could not be found.".into()
        )));
        assert!(!is_not_found(&RemoteError::Transport(
            "DeploymentNotFound".into()
        )));
    }

    #[test]
    fn parse_outputs_handles_null_and_objects() {
        assert!(parse_outputs("null\n").unwrap().is_empty());
        assert!(parse_outputs("").unwrap().is_empty());

        let outputs =
            parse_outputs(r#"{"browserUrl": {"type": "String", "value": "http://10.0.0.4:7474"}}"#)
                .unwrap();
        assert_eq!(
            outputs["browserUrl"]["value"],
            serde_json::json!("http://10.0.0.4:7474")
        );

        assert!(matches!(
            parse_outputs("not json"),
            Err(RemoteError::Malformed(_))
        ));
    }

    #[test]
    fn parse_sub_step_errors_keeps_only_failed_steps() {
        let json = r#"[
            {"properties": {"provisioningState": "Succeeded",
                "targetResource": {"resourceName": "vnet", "resourceType": "Microsoft.Network/virtualNetworks"}}},
            {"properties": {"provisioningState": "Failed", "statusCode": "Conflict",
                "statusMessage": {"error": {"code": "SkuNotAvailable", "message": "SKU not available in region"}},
                "targetResource": {"resourceName": "vm0", "resourceType": "Microsoft.Compute/virtualMachines"}}},
            {"properties": {"provisioningState": "Failed"}}
        ]"#;

        let errors = parse_sub_step_errors(json).unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[0],
            SubStepError {
                resource_name: "vm0".into(),
                resource_type: "Microsoft.Compute/virtualMachines".into(),
                status_code: "Conflict".into(),
                message: "SKU not available in region".into(),
            }
        );
        assert_eq!(errors[1].resource_name, "unknown");
        assert_eq!(errors[1].message, "no message");
    }

    #[test]
    fn parse_managed_targets_reads_names() {
        let targets =
            parse_managed_targets(r#"[{"name": "ephem-test-a"}, {"name": "ephem-test-b"}]"#)
                .unwrap();
        assert_eq!(
            targets,
            vec![
                ManagedTarget { name: "ephem-test-a".into() },
                ManagedTarget { name: "ephem-test-b".into() },
            ]
        );
        assert!(parse_managed_targets("").unwrap().is_empty());
    }

    #[test]
    fn response_consumed_is_spurious() {
        let client = AzCliClient::default();
        assert!(client.is_spurious_failure(&RemoteError::Rejected(
            "The content for this response was already consumed".into()
        )));
        assert!(!client.is_spurious_failure(&RemoteError::Rejected("QuotaExceeded".into())));
    }

    #[tokio::test]
    async fn missing_executable_is_a_transport_error() {
        let client = AzCliClient::new("/nonexistent/az-binary");
        let err = client
            .destroy(&TargetRef::new("rg"), false)
            .await
            .unwrap_err();
        assert!(err.is_transient(), "got {err:?}");
    }
}
