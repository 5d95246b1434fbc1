// ABOUTME: Diagnostics accumulator for non-fatal warnings during lifecycle runs.
// ABOUTME: Collects warnings that shouldn't fail a batch but should be shown to users.

/// Collects non-fatal warnings during lifecycle operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Whether a warning of the given kind was collected.
    pub fn has_kind(&self, kind: WarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }
}

/// A non-fatal warning collected during a lifecycle operation.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A scenario was dropped from the batch before submission.
    pub fn scenario_skipped(message: impl Into<String>) -> Self {
        Self::new(WarningKind::ScenarioSkipped, message)
    }

    /// Outputs of a succeeded operation could not be read.
    pub fn outputs_unavailable(message: impl Into<String>) -> Self {
        Self::new(WarningKind::OutputsUnavailable, message)
    }

    /// Connection info could not be derived or written.
    pub fn connection_info(message: impl Into<String>) -> Self {
        Self::new(WarningKind::ConnectionInfo, message)
    }

    /// An age filter could not be parsed.
    pub fn invalid_age_filter(message: impl Into<String>) -> Self {
        Self::new(WarningKind::InvalidAgeFilter, message)
    }

    /// The managed-target registry could not be listed.
    pub fn registry_unavailable(message: impl Into<String>) -> Self {
        Self::new(WarningKind::RegistryUnavailable, message)
    }

    /// A forced teardown bypassed the policy or the managed-tag check.
    pub fn forced(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Forced, message)
    }
}

/// Categories of warnings that can occur during lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Target creation failed; the scenario was not submitted.
    ScenarioSkipped,
    /// Reading operation outputs failed.
    OutputsUnavailable,
    /// Connection info was not derived or persisted.
    ConnectionInfo,
    /// `--older-than` value did not parse; nothing was selected.
    InvalidAgeFilter,
    /// Managed targets could not be listed; teardown refused unless forced.
    RegistryUnavailable,
    /// A safety check was bypassed with `--force`.
    Forced,
}
