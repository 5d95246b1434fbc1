// ABOUTME: Error type for remote control-plane calls.
// ABOUTME: Distinguishes rejected requests from transient transport problems.

/// Errors from [`RemoteClient`](super::RemoteClient) calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The remote side processed the call and reported failure.
    #[error("remote rejected the request: {0}")]
    Rejected(String),

    /// The remote side could not be reached or the call did not complete.
    #[error("remote unreachable: {0}")]
    Transport(String),

    /// The remote side asked us to slow down.
    #[error("remote rate limited: {0}")]
    Throttled(String),

    /// The call succeeded but the response could not be understood.
    #[error("unexpected remote response: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// Whether retrying on the next poll tick may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transport(_) | RemoteError::Throttled(_))
    }

    /// The raw text reported by the remote side.
    pub fn raw_message(&self) -> &str {
        match self {
            RemoteError::Rejected(msg)
            | RemoteError::Transport(msg)
            | RemoteError::Throttled(msg)
            | RemoteError::Malformed(msg) => msg,
        }
    }
}
