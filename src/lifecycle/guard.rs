// ABOUTME: Safety gate refusing to destroy targets this controller does not manage.
// ABOUTME: Membership comes from the remote managed-tag listing, fetched once per batch.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::remote::{ManagedTag, RemoteClient};
use crate::types::TargetRef;

/// Why a teardown was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum RefusalReason {
    /// The target does not carry the managed tag.
    NotManaged { tag: String },
    /// Managed targets could not be listed, so membership is unknown.
    RegistryUnavailable { error: String },
}

/// A teardown the safety gate declined to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyRefusal {
    pub target: String,
    #[serde(flatten)]
    pub reason: RefusalReason,
}

impl fmt::Display for SafetyRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            RefusalReason::NotManaged { tag } => write!(
                f,
                "target {} is not tagged {tag}; refusing to destroy it (use --force to override)",
                self.target
            ),
            RefusalReason::RegistryUnavailable { error } => write!(
                f,
                "cannot confirm target {} is managed ({error}); refusing to destroy it (use --force to override)",
                self.target
            ),
        }
    }
}

/// Outcome of the safety gate for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    Allowed,
    /// Not confirmed managed, but `force` was set.
    ForcedUnmanaged,
    Refused(SafetyRefusal),
}

#[derive(Debug, Clone)]
enum Membership {
    Known(HashSet<String>),
    Unavailable(String),
}

/// Snapshot of the targets carrying the managed tag.
#[derive(Debug, Clone)]
pub struct ManagedRegistry {
    tag: ManagedTag,
    membership: Membership,
}

impl ManagedRegistry {
    /// List managed targets from the remote side.
    ///
    /// A listing failure is not an error: the registry becomes "unavailable"
    /// and refuses every unforced teardown.
    pub async fn fetch<R: RemoteClient + ?Sized>(remote: &R, tag: &ManagedTag) -> Self {
        match remote.list_managed(tag).await {
            Ok(targets) => Self::from_names(tag.clone(), targets.into_iter().map(|t| t.name)),
            Err(e) => {
                tracing::warn!("failed to list targets tagged {tag}: {e}");
                Self::unavailable(tag.clone(), e.to_string())
            }
        }
    }

    pub fn from_names(tag: ManagedTag, names: impl IntoIterator<Item = String>) -> Self {
        Self {
            tag,
            membership: Membership::Known(names.into_iter().collect()),
        }
    }

    pub fn unavailable(tag: ManagedTag, error: impl Into<String>) -> Self {
        Self {
            tag,
            membership: Membership::Unavailable(error.into()),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.membership, Membership::Known(_))
    }

    pub fn contains(&self, target: &TargetRef) -> bool {
        match &self.membership {
            Membership::Known(names) => names.contains(target.as_str()),
            Membership::Unavailable(_) => false,
        }
    }

    /// Names of managed targets, in unspecified order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        let names = match &self.membership {
            Membership::Known(names) => Some(names),
            Membership::Unavailable(_) => None,
        };
        names.into_iter().flatten().map(String::as_str)
    }

    /// Check whether `target` may be destroyed.
    pub fn check(&self, target: &TargetRef, force: bool) -> GateVerdict {
        if self.contains(target) {
            return GateVerdict::Allowed;
        }
        if force {
            return GateVerdict::ForcedUnmanaged;
        }
        let reason = match &self.membership {
            Membership::Known(_) => RefusalReason::NotManaged {
                tag: self.tag.to_string(),
            },
            Membership::Unavailable(error) => RefusalReason::RegistryUnavailable {
                error: error.clone(),
            },
        };
        GateVerdict::Refused(SafetyRefusal {
            target: target.to_string(),
            reason,
        })
    }
}
