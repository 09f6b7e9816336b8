//! Error types for the vigil-core crate.

use thiserror::Error;

/// Errors that can occur while constructing or validating domain types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid alert rule configuration.
    #[error("invalid alert rule: {reason}")]
    InvalidRule {
        /// The reason the rule is invalid.
        reason: String,
    },

    /// Invalid metric identifier.
    #[error("invalid metric id: {reason}")]
    InvalidMetric {
        /// The reason the metric id is invalid.
        reason: String,
    },

    /// Invalid identifier string.
    #[error("invalid id: {0}")]
    InvalidId(String),

    /// Invalid policy configuration.
    #[error("invalid policy: {reason}")]
    InvalidPolicy {
        /// The reason the policy is invalid.
        reason: String,
    },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_invalid_rule() {
        let err = CoreError::InvalidRule {
            reason: "empty name".to_string(),
        };
        assert_eq!(err.to_string(), "invalid alert rule: empty name");
    }

    #[test]
    fn error_display_invalid_metric() {
        let err = CoreError::InvalidMetric {
            reason: "uppercase".to_string(),
        };
        assert_eq!(err.to_string(), "invalid metric id: uppercase");
    }

    #[test]
    fn error_display_invalid_id() {
        let err = CoreError::InvalidId("not-a-uuid".to_string());
        assert_eq!(err.to_string(), "invalid id: not-a-uuid");
    }
}
