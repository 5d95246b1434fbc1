// ABOUTME: Error types for lifecycle operations and classification of submit failures.
// ABOUTME: Maps raw remote error text onto a small set of actionable categories.

use serde::Serialize;
use std::fmt;

use crate::remote::RemoteError;
use crate::store::{StoreError, TtlOutOfRange};

/// Errors that abort a lifecycle operation as a whole.
///
/// Per-item failures inside a batch are reported in the batch result instead.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("remote call failed: {0}")]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Ttl(#[from] TtlOutOfRange),

    #[error("no deployment matches '{0}'")]
    NoMatch(String),

    #[error("'{query}' matches {} deployments: {}", .candidates.len(), .candidates.join(", "))]
    Ambiguous {
        query: String,
        candidates: Vec<String>,
    },
}

/// Broad cause of a rejected submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCategory {
    QuotaExceeded,
    InvalidTemplate,
    Unauthorized,
    ResourceNotFound,
    Other,
}

impl FailureCategory {
    fn hint(&self) -> Option<&'static str> {
        match self {
            FailureCategory::QuotaExceeded => {
                Some("reduce the instance count or size, or request a quota increase")
            }
            FailureCategory::InvalidTemplate => Some("check the template and parameter file"),
            FailureCategory::Unauthorized => {
                Some("check that the current identity may create deployments")
            }
            FailureCategory::ResourceNotFound => {
                Some("a resource referenced by the template does not exist")
            }
            FailureCategory::Other => None,
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureCategory::QuotaExceeded => "quota exceeded",
            FailureCategory::InvalidTemplate => "invalid template",
            FailureCategory::Unauthorized => "authorization failed",
            FailureCategory::ResourceNotFound => "resource not found",
            FailureCategory::Other => "submission failed",
        };
        f.write_str(label)
    }
}

/// A classified submission failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitFailure {
    pub category: FailureCategory,
    /// One-line human summary.
    pub summary: String,
    /// Full raw text reported by the remote side.
    pub detail: String,
}

impl fmt::Display for SubmitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary)
    }
}

const CATEGORY_MARKERS: &[(&str, FailureCategory)] = &[
    ("QuotaExceeded", FailureCategory::QuotaExceeded),
    ("InvalidTemplateDeployment", FailureCategory::InvalidTemplate),
    ("InvalidTemplate", FailureCategory::InvalidTemplate),
    ("AuthorizationFailed", FailureCategory::Unauthorized),
    ("ResourceNotFound", FailureCategory::ResourceNotFound),
];

/// Classify the raw text of a failed submission.
pub fn classify_failure(raw: &str) -> SubmitFailure {
    let category = CATEGORY_MARKERS
        .iter()
        .find(|(marker, _)| raw.contains(marker))
        .map(|(_, category)| *category)
        .unwrap_or(FailureCategory::Other);

    let summary = match category.hint() {
        Some(hint) => format!("{category}: {hint}"),
        None => raw
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("unknown error")
            .to_string(),
    };

    SubmitFailure {
        category,
        summary,
        detail: raw.to_string(),
    }
}
