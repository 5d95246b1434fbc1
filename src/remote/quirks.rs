// ABOUTME: Integration-specific false-negative detectors for remote adapters.
// ABOUTME: Lets an adapter flag errors that may hide an accepted request.

use super::RemoteError;

/// Recognizes a known false-negative signature of one remote integration.
pub trait QuirkDetector: Send + Sync + std::fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether `error` matches this quirk.
    fn matches(&self, error: &RemoteError) -> bool;
}

/// The Azure CLI occasionally fails while draining a response stream after the
/// request was accepted, reporting "The content for this response was already
/// consumed" with a non-zero exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseConsumedQuirk;

const RESPONSE_CONSUMED: &str = "The content for this response was already consumed";

impl QuirkDetector for ResponseConsumedQuirk {
    fn name(&self) -> &'static str {
        "response-consumed"
    }

    fn matches(&self, error: &RemoteError) -> bool {
        matches!(error, RemoteError::Rejected(msg) if msg.contains(RESPONSE_CONSUMED))
    }
}
