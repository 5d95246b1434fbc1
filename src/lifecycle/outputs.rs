// ABOUTME: Turns operation outputs into client connection info.
// ABOUTME: Resolves protocol endpoints and persists connection files atomically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use super::naming::timestamp;
use crate::remote::Outputs;
use crate::store::{DeploymentRecord, StoreError, persist_json};
use crate::types::{DeploymentId, OperationRef, ScenarioName, TargetRef};

/// How to derive the client endpoint from operation outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    /// Scheme of the client protocol.
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Port the client protocol listens on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Output holding the discovery address.
    #[serde(default = "default_output_key")]
    pub output_key: String,
}

fn default_scheme() -> String {
    "neo4j".to_string()
}

fn default_port() -> u16 {
    7687
}

fn default_output_key() -> String {
    "browserUrl".to_string()
}

impl Default for EndpointSpec {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            port: default_port(),
            output_key: default_output_key(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("invalid discovery address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("discovery address '{0}' has no host")]
    MissingHost(String),
}

/// Rewrite a discovery address into a client endpoint.
///
/// Only the host is kept: `http://10.0.0.4:7474` becomes
/// `neo4j://10.0.0.4:7687` with the default spec. A bare `host:port` is
/// accepted as well.
pub fn resolve_endpoint(address: &str, spec: &EndpointSpec) -> Result<String, EndpointError> {
    let address = address.trim();
    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    };

    let url = Url::parse(&candidate).map_err(|e| EndpointError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })?;

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| EndpointError::MissingHost(address.to_string()))?;

    Ok(format!("{}://{}:{}", spec.scheme, host, spec.port))
}

/// Value of output `key`, unwrapping the `{ "type": .., "value": .. }` envelope.
pub fn output_value(outputs: &Outputs, key: &str) -> Option<String> {
    let raw = outputs.get(key)?;
    let value = raw.get("value").unwrap_or(raw);
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Everything a test client needs to reach a deployed environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub deployment_id: DeploymentId,
    pub scenario: ScenarioName,
    pub target: TargetRef,
    pub operation: OperationRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_address: Option<String>,
    pub outputs: Outputs,
    pub created_at: DateTime<Utc>,
}

impl ConnectionInfo {
    /// Build connection info for `record` from its operation outputs.
    ///
    /// A missing or unusable discovery address leaves `uri` empty and is
    /// returned as the second element.
    pub fn from_outputs(
        record: &DeploymentRecord,
        outputs: Outputs,
        spec: &EndpointSpec,
        now: DateTime<Utc>,
    ) -> (Self, Option<EndpointError>) {
        let discovery_address = output_value(&outputs, &spec.output_key);
        let (uri, problem) = match discovery_address.as_deref().map(|a| resolve_endpoint(a, spec)) {
            Some(Ok(uri)) => (Some(uri), None),
            Some(Err(e)) => (None, Some(e)),
            None => (None, None),
        };

        let info = Self {
            deployment_id: record.id.clone(),
            scenario: record.scenario.clone(),
            target: record.target.clone(),
            operation: record.operation.clone(),
            uri,
            discovery_address,
            outputs,
            created_at: now,
        };
        (info, problem)
    }

    /// File name under the results directory.
    pub fn file_name(&self) -> String {
        format!(
            "connection-{}-{}.json",
            self.scenario.slug(),
            timestamp(self.created_at)
        )
    }

    /// Atomically write this connection info into `dir`, returning the file path.
    pub async fn persist(&self, dir: &Path) -> Result<PathBuf, StoreError> {
        let path = dir.join(self.file_name());
        persist_json(dir, &path, self).await?;
        Ok(path)
    }
}
