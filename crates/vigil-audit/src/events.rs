//! Audit event types.
//!
//! Events are an append-only record of security-relevant moments in
//! the triage workflow. Cross-tenant access attempts are security
//! events per the platform's threat model, not mere errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vigil_core::{AlertId, OrgId, RuleId, UserId};
use vigil_policy::ActionKind;

/// Severity of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    /// Routine, informational.
    Info,
    /// Unusual but expected under normal operation.
    Medium,
    /// Potential security violation.
    Critical,
}

impl std::fmt::Display for AuditSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Medium => "medium",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// Payload of one audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AuditKind {
    /// A caller tried to read or mutate an alert in another
    /// organization.
    CrossTenantDenied {
        /// The calling user.
        user_id: UserId,
        /// The caller's organization.
        caller_org: OrgId,
        /// The organization that owns the target.
        target_org: OrgId,
        /// The alert involved, if known.
        alert_id: Option<AlertId>,
        /// The attempted action.
        action: String,
    },
    /// A supervisor transferred a claim away from its holder.
    ClaimDisplaced {
        /// The alert whose claim moved.
        alert_id: AlertId,
        /// The user who lost the claim.
        displaced: UserId,
        /// The supervisor who took it.
        new_holder: UserId,
    },
    /// A bulk operation was applied.
    BulkActionApplied {
        /// The acting user.
        user_id: UserId,
        /// The action applied.
        action: ActionKind,
        /// How many alerts were targeted.
        targeted: usize,
        /// How many succeeded.
        succeeded: usize,
    },
    /// A rule was deactivated instead of deleted because alerts still
    /// reference it.
    RuleDeactivated {
        /// The rule.
        rule_id: RuleId,
        /// The acting user.
        user_id: UserId,
    },
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event id.
    pub event_id: Uuid,
    /// What happened.
    pub kind: AuditKind,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Wraps a kind with a fresh id and the current time.
    #[must_use]
    pub fn new(kind: AuditKind) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
        }
    }

    /// A short name for the event type.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self.kind {
            AuditKind::CrossTenantDenied { .. } => "cross_tenant_denied",
            AuditKind::ClaimDisplaced { .. } => "claim_displaced",
            AuditKind::BulkActionApplied { .. } => "bulk_action_applied",
            AuditKind::RuleDeactivated { .. } => "rule_deactivated",
        }
    }

    /// The severity of this event.
    #[must_use]
    pub const fn severity(&self) -> AuditSeverity {
        match self.kind {
            AuditKind::CrossTenantDenied { .. } => AuditSeverity::Critical,
            AuditKind::ClaimDisplaced { .. } => AuditSeverity::Medium,
            AuditKind::BulkActionApplied { .. } | AuditKind::RuleDeactivated { .. } => {
                AuditSeverity::Info
            }
        }
    }

    /// Serializes the event for structured logging.
    ///
    /// # Errors
    ///
    /// Returns a serde error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_tenant_is_critical() {
        let event = AuditEvent::new(AuditKind::CrossTenantDenied {
            user_id: UserId::new(),
            caller_org: OrgId::new(),
            target_org: OrgId::new(),
            alert_id: Some(AlertId::new()),
            action: "claim".to_string(),
        });
        assert_eq!(event.severity(), AuditSeverity::Critical);
        assert_eq!(event.event_type(), "cross_tenant_denied");
    }

    #[test]
    fn claim_displaced_is_medium() {
        let event = AuditEvent::new(AuditKind::ClaimDisplaced {
            alert_id: AlertId::new(),
            displaced: UserId::new(),
            new_holder: UserId::new(),
        });
        assert_eq!(event.severity(), AuditSeverity::Medium);
    }

    #[test]
    fn bulk_action_is_info() {
        let event = AuditEvent::new(AuditKind::BulkActionApplied {
            user_id: UserId::new(),
            action: ActionKind::Resolve,
            targeted: 5,
            succeeded: 4,
        });
        assert_eq!(event.severity(), AuditSeverity::Info);
    }

    #[test]
    fn severity_ordering() {
        assert!(AuditSeverity::Info < AuditSeverity::Medium);
        assert!(AuditSeverity::Medium < AuditSeverity::Critical);
    }

    #[test]
    fn event_serializes_to_json() {
        let event = AuditEvent::new(AuditKind::RuleDeactivated {
            rule_id: RuleId::new(),
            user_id: UserId::new(),
        });
        let json = event.to_json().unwrap();
        assert!(json.contains("rule_deactivated"));
    }
}
