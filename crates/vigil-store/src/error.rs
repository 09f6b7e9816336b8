//! Store error types.

use thiserror::Error;

use vigil_core::{AlertId, AlertStatus, OrgId, PatientId, RuleId, UserId};
use vigil_policy::ActionKind;

/// Errors returned by the alert, rule, and observation stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The alert does not exist.
    #[error("alert not found: {0}")]
    AlertNotFound(AlertId),

    /// The rule does not exist.
    #[error("rule not found: {0}")]
    RuleNotFound(RuleId),

    /// The caller's organization does not own the target alert.
    ///
    /// Callers must treat this as a security event, not a routine
    /// failure, and record an audit entry.
    #[error("alert {alert_id} does not belong to organization {caller_org}")]
    OrganizationAccessDenied {
        /// The alert that was targeted.
        alert_id: AlertId,
        /// The organization the caller acted for.
        caller_org: OrgId,
        /// The organization that owns the alert.
        target_org: OrgId,
    },

    /// Another user holds a live claim on the alert.
    #[error("alert {alert_id} is already claimed by {holder}")]
    AlreadyClaimed {
        /// The contested alert.
        alert_id: AlertId,
        /// The current lease holder.
        holder: UserId,
    },

    /// The caller does not hold the claim required for the operation.
    #[error("alert {alert_id} is not claimed by the caller")]
    NotHolder {
        /// The alert in question.
        alert_id: AlertId,
        /// The actual live holder, if any.
        holder: Option<UserId>,
    },

    /// An open alert already exists for this (patient, rule) pair.
    #[error("open alert {existing} already covers patient {patient_id} for rule {rule_id}")]
    DuplicateOpenAlert {
        /// The patient.
        patient_id: PatientId,
        /// The rule.
        rule_id: RuleId,
        /// The alert that already covers the pair.
        existing: AlertId,
    },

    /// The requested action is not legal from the alert's current
    /// status.
    #[error("cannot {action} an alert in status {status}")]
    InvalidTransition {
        /// The alert's current status.
        status: AlertStatus,
        /// The attempted action.
        action: ActionKind,
    },

    /// A rule with this id is already registered.
    #[error("rule already exists: {0}")]
    DuplicateRule(RuleId),
}

/// Convenience alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
