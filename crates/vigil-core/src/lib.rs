//! Domain types for the Vigil clinical alert triage engine.
//!
//! `vigil-core` holds the shared vocabulary of the platform core: ids,
//! severities and lifecycle states, rule definitions and condition
//! evaluation, alert records with claim leases, escalation events,
//! observations, and the time policies (SLA windows, escalation
//! backoff, claim lease duration, snooze bounds) the engine runs on.
//!
//! The crate performs no I/O; storage and workflow live in
//! `vigil-store` and `vigil-engine`.
//!
//! # Example
//!
//! ```rust
//! use vigil_core::{
//!     AlertRule, Comparator, MetricId, RuleCondition, Severity, SlaPolicy,
//! };
//!
//! // pain_score >= 8 raises a HIGH alert.
//! let rule = AlertRule::builder(
//!     "High pain score",
//!     MetricId::new("pain_score").unwrap(),
//!     RuleCondition::threshold(Comparator::GreaterThanOrEqual, 8.0),
//! )
//! .severity(Severity::High)
//! .build()
//! .unwrap();
//!
//! // HIGH alerts must be acknowledged within an hour by default.
//! let window = SlaPolicy::default().window(rule.severity);
//! assert_eq!(window.num_minutes(), 60);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod alert;
pub mod error;
pub mod ids;
pub mod policy;
pub mod rule;
pub mod types;

// Re-export main types at crate root
pub use alert::{Alert, ClaimLease, EscalationEvent, Observation};
pub use error::{CoreError, Result};
pub use ids::{
    AlertId, EscalationEventId, MetricId, OrgId, PatientId, RuleId, UserId,
    MAX_METRIC_ID_LENGTH, MIN_METRIC_ID_LENGTH,
};
pub use policy::{Backoff, ClaimPolicy, EscalationPolicy, SlaPolicy, SnoozePolicy, TriagePolicy};
pub use rule::{
    AlertRule, AlertRuleBuilder, CompositeMode, EvalContext, ObservationPoint, RuleCondition,
    TrendDirection, MAX_RULE_NAME_LENGTH,
};
pub use types::{Actor, AlertStatus, Comparator, ConditionOutcome, Severity};
