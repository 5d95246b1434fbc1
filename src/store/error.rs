// ABOUTME: State store error types with SNAFU context selectors.
// ABOUTME: Separates unknown ids from I/O and corruption for programmatic handling.

use snafu::Snafu;
use std::path::PathBuf;

/// Errors from reading or writing the deployment state.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("deployment not found: {id}"))]
    NotFound { id: String },

    #[snafu(display("failed to create directory {}: {source}", path.display()))]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to read state file {}: {source}", path.display()))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("state file {} is corrupt: {source}", path.display()))]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("failed to serialize state: {source}"))]
    Serialize { source: serde_json::Error },

    #[snafu(display("failed to write {}: {source}", path.display()))]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("state writer task failed: {source}"))]
    Task { source: tokio::task::JoinError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// No record exists for the requested id.
    NotFound,
    /// The state file exists but cannot be decoded.
    Corrupt,
    /// Filesystem or task failure.
    Io,
}

impl StoreError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            StoreError::NotFound { .. } => StoreErrorKind::NotFound,
            StoreError::Parse { .. } => StoreErrorKind::Corrupt,
            StoreError::CreateDir { .. }
            | StoreError::Read { .. }
            | StoreError::Serialize { .. }
            | StoreError::Write { .. }
            | StoreError::Task { .. } => StoreErrorKind::Io,
        }
    }

    pub fn not_found(id: impl std::fmt::Display) -> Self {
        StoreError::NotFound { id: id.to_string() }
    }
}
