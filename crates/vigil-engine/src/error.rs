//! Engine error types.

use thiserror::Error;

use vigil_core::RuleId;
use vigil_policy::PolicyError;
use vigil_store::StoreError;

/// Errors returned by the triage engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A request parameter failed validation.
    #[error("{reason}")]
    Validation {
        /// What was wrong.
        reason: String,
    },

    /// Severity and comparator are immutable once alerts reference the
    /// rule; clone the rule instead.
    #[error("rule {0} is referenced by alerts; severity and comparator are immutable")]
    RuleReferenced(RuleId),

    /// A storage-level failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An authorization failure.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl EngineError {
    /// Builds a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation { reason: reason.into() }
    }
}

/// Convenience alias for engine results.
pub type Result<T> = std::result::Result<T, EngineError>;
