//! Per-extension failures and per-batch outcome reports.
//!
//! Nothing that goes wrong inside one extension escapes the manager as an
//! error of the manager itself. Each failure is logged, recorded here and
//! the batch moves on.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::extension::LifecycleError;

/// Lifecycle phase a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Discover,
    Instantiate,
    Register,
    Boot,
    Deactivate,
    Uninstall,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Discover => "discover",
            Self::Instantiate => "instantiate",
            Self::Register => "register",
            Self::Boot => "boot",
            Self::Deactivate => "deactivate",
            Self::Uninstall => "uninstall",
        };
        f.write_str(name)
    }
}

/// Why an extension was excluded or a lifecycle call did not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    /// The manifest at the given path could not be read or parsed.
    #[error("manifest unreadable at {path}: {reason}")]
    ManifestUnreadable { path: PathBuf, reason: String },

    /// No factory is registered in the catalog for the implementing type.
    #[error("extension class '{class}' not found")]
    ClassMissing { class: String },

    /// The instance does not satisfy the capability contract.
    #[error("extension class '{class}' violates the extension contract: {reason}")]
    ContractViolation { class: String, reason: String },

    /// A declared dependency is not registered.
    #[error("dependency '{dependency}' ({constraint}) is not registered")]
    DependencyUnmet {
        dependency: String,
        constraint: String,
    },

    /// A registered dependency does not satisfy the declared constraint.
    #[error("dependency '{dependency}' is at version {found}, which does not satisfy {constraint}")]
    VersionMismatch {
        dependency: String,
        constraint: String,
        found: String,
    },

    /// A declared constraint cannot be parsed.
    #[error("dependency '{dependency}' declares an invalid constraint: {reason}")]
    InvalidConstraint { dependency: String, reason: String },

    /// The extension takes part in (or waits on) a dependency cycle.
    #[error("dependency cycle between: {}", participants.join(", "))]
    DependencyCycle { participants: Vec<String> },

    /// The extension's own lifecycle code returned an error.
    #[error("{phase} failed: {source}")]
    Lifecycle {
        phase: Phase,
        source: LifecycleError,
    },

    /// The extension's own lifecycle code panicked.
    #[error("{phase} panicked: {message}")]
    Panicked { phase: Phase, message: String },

    /// The id is not registered.
    #[error("extension is not registered")]
    UnknownExtension,

    /// Other registered extensions still depend on this one.
    #[error("still required by: {}", dependents.join(", "))]
    DependentsRegistered { dependents: Vec<String> },
}

/// One failed extension operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("extension '{id}': {reason}")]
pub struct ExtensionFailure {
    pub id: String,
    pub reason: FailureReason,
}

impl ExtensionFailure {
    pub fn new(id: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            id: id.into(),
            reason,
        }
    }

    /// Phase the failure belongs to.
    pub fn phase(&self) -> Phase {
        match &self.reason {
            FailureReason::ManifestUnreadable { .. } => Phase::Discover,
            FailureReason::ClassMissing { .. } | FailureReason::ContractViolation { .. } => {
                Phase::Instantiate
            }
            FailureReason::Lifecycle { phase, .. } | FailureReason::Panicked { phase, .. } => {
                *phase
            }
            FailureReason::DependencyUnmet { .. }
            | FailureReason::VersionMismatch { .. }
            | FailureReason::InvalidConstraint { .. }
            | FailureReason::DependencyCycle { .. }
            | FailureReason::UnknownExtension
            | FailureReason::DependentsRegistered { .. } => Phase::Register,
        }
    }
}

/// Outcome of a batch operation such as registering or booting everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Ids that completed, in processing order.
    pub succeeded: Vec<String>,
    /// Failures, in processing order.
    pub failed: Vec<ExtensionFailure>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, id: impl Into<String>) {
        self.succeeded.push(id.into());
    }

    pub fn record_failure(&mut self, failure: ExtensionFailure) {
        self.failed.push(failure);
    }

    /// Whether every processed extension succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// The failure recorded for `id`, if any.
    pub fn failure_for(&self, id: &str) -> Option<&ExtensionFailure> {
        self.failed.iter().find(|f| f.id == id)
    }

    /// Total number of processed extensions.
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: BatchReport) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
    }
}

/// Outcome of registering and then booting everything at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupReport {
    pub registration: BatchReport,
    pub boot: BatchReport,
}

impl StartupReport {
    pub fn is_clean(&self) -> bool {
        self.registration.is_clean() && self.boot.is_clean()
    }

    /// Every failure from both phases, registration first.
    pub fn failures(&self) -> impl Iterator<Item = &ExtensionFailure> {
        self.registration.failed.iter().chain(self.boot.failed.iter())
    }
}
