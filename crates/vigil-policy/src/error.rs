//! Error types for the vigil-policy crate.

use thiserror::Error;

use crate::types::{ActionKind, Role};

/// Errors produced by policy evaluation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// The caller's role is below the floor for the action.
    #[error("{action} requires at least {required}, caller is {actual}")]
    Forbidden {
        /// The attempted action.
        action: ActionKind,
        /// The minimum role required.
        required: Role,
        /// The caller's role.
        actual: Role,
    },

    /// The action requires holding the claim on the alert.
    #[error("{action} requires the claim on this alert")]
    NotClaimHolder {
        /// The attempted action.
        action: ActionKind,
    },
}

/// Result type for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;
