//! Identifier newtypes used throughout the triage engine.
//!
//! All entity ids wrap a [`Uuid`]; [`MetricId`] is a validated string
//! key referencing a clinical metric (e.g. `pain_score`, `heart_rate`).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random id.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an id from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse an id from a string.
            ///
            /// # Errors
            ///
            /// Returns an error if the string is not a valid UUID.
            pub fn parse(s: &str) -> Result<Self> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| CoreError::InvalidId(format!("{s}: {e}")))
            }

            /// Get the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for an alert.
    AlertId
}

uuid_id! {
    /// Unique identifier for an alert rule.
    RuleId
}

uuid_id! {
    /// Unique identifier for a patient.
    PatientId
}

uuid_id! {
    /// Unique identifier for a user (clinician, coordinator, admin).
    UserId
}

uuid_id! {
    /// Unique identifier for an organization (tenant).
    OrgId
}

uuid_id! {
    /// Unique identifier for an escalation event.
    EscalationEventId
}

/// Minimum length for metric ids.
pub const MIN_METRIC_ID_LENGTH: usize = 1;

/// Maximum length for metric ids.
pub const MAX_METRIC_ID_LENGTH: usize = 64;

/// A validated clinical metric key.
///
/// Metric ids must be 1-64 characters, start with a lowercase letter,
/// and contain only lowercase letters, digits, and underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricId(String);

impl MetricId {
    /// Create a validated metric id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidMetric`] if the key does not match
    /// the required shape.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();

        if key.is_empty() {
            return Err(CoreError::InvalidMetric {
                reason: "metric id cannot be empty".to_string(),
            });
        }

        if key.len() > MAX_METRIC_ID_LENGTH {
            return Err(CoreError::InvalidMetric {
                reason: format!("metric id too long: {} > {MAX_METRIC_ID_LENGTH}", key.len()),
            });
        }

        let mut chars = key.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() => {}
            Some(c) => {
                return Err(CoreError::InvalidMetric {
                    reason: format!("must start with a lowercase letter, got '{c}'"),
                });
            }
            None => {
                return Err(CoreError::InvalidMetric {
                    reason: "metric id cannot be empty".to_string(),
                });
            }
        }

        for c in chars {
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '_' {
                return Err(CoreError::InvalidMetric {
                    reason: format!("invalid character '{c}'"),
                });
            }
        }

        Ok(Self(key))
    }

    /// The metric key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_id_roundtrip() {
        let id = AlertId::new();
        let parsed = AlertId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn alert_id_parse_invalid_fails() {
        let result = AlertId::parse("not-a-uuid");
        assert!(matches!(result, Err(CoreError::InvalidId(_))));
    }

    #[test]
    fn ids_are_distinct() {
        assert_ne!(AlertId::new(), AlertId::new());
        assert_ne!(RuleId::new(), RuleId::new());
    }

    #[test]
    fn id_serde_is_transparent() {
        let id = PatientId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: PatientId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn metric_id_valid() {
        let metric = MetricId::new("pain_score").unwrap();
        assert_eq!(metric.as_str(), "pain_score");
        assert_eq!(metric.to_string(), "pain_score");
    }

    #[test]
    fn metric_id_empty_fails() {
        assert!(MetricId::new("").is_err());
    }

    #[test]
    fn metric_id_uppercase_fails() {
        assert!(MetricId::new("PainScore").is_err());
    }

    #[test]
    fn metric_id_leading_digit_fails() {
        assert!(MetricId::new("9lives").is_err());
    }

    #[test]
    fn metric_id_invalid_char_fails() {
        assert!(MetricId::new("pain-score").is_err());
    }

    #[test]
    fn metric_id_too_long_fails() {
        let key = "a".repeat(MAX_METRIC_ID_LENGTH + 1);
        assert!(MetricId::new(key).is_err());
    }
}
