//! Typed alert query filters.
//!
//! Every list query goes through [`AlertQueryFilter`] so filtering
//! logic lives in one place instead of ad-hoc predicates at call
//! sites.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vigil_core::{Alert, AlertStatus, PatientId, RuleId, Severity, UserId};

/// Criteria for selecting alerts within one organization.
///
/// All fields are conjunctive; an unset field matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertQueryFilter {
    /// Match alerts in any of these statuses. Empty means any status.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<AlertStatus>,
    /// Match only this severity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Match alerts for this patient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<PatientId>,
    /// Match alerts produced by this rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<RuleId>,
    /// Match alerts whose live claim is held by this user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<UserId>,
    /// Match only alerts with no live claim.
    #[serde(default)]
    pub unclaimed_only: bool,
    /// Match on suppression state. Unset matches both.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppressed: Option<bool>,
    /// Match alerts created at or after this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_after: Option<DateTime<Utc>>,
    /// Match alerts created at or before this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_before: Option<DateTime<Utc>>,
}

impl AlertQueryFilter {
    /// A filter matching every alert in the organization.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// A filter matching open alerts (pending or acknowledged).
    #[must_use]
    pub fn open() -> Self {
        Self {
            statuses: vec![AlertStatus::Pending, AlertStatus::Acknowledged],
            ..Self::default()
        }
    }

    /// Restrict to one severity.
    #[must_use]
    pub const fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Restrict to one patient.
    #[must_use]
    pub const fn with_patient(mut self, patient_id: PatientId) -> Self {
        self.patient_id = Some(patient_id);
        self
    }

    /// Restrict to alerts from one rule.
    #[must_use]
    pub const fn with_rule(mut self, rule_id: RuleId) -> Self {
        self.rule_id = Some(rule_id);
        self
    }

    /// Restrict to alerts claimed by a user (live leases only).
    #[must_use]
    pub const fn with_claimed_by(mut self, user_id: UserId) -> Self {
        self.claimed_by = Some(user_id);
        self
    }

    /// Restrict to alerts with no live claim.
    #[must_use]
    pub const fn unclaimed(mut self) -> Self {
        self.unclaimed_only = true;
        self
    }

    /// Restrict on suppression state.
    #[must_use]
    pub const fn with_suppressed(mut self, suppressed: bool) -> Self {
        self.suppressed = Some(suppressed);
        self
    }

    /// Returns true if the alert satisfies every set criterion.
    ///
    /// `now` anchors lease-expiry checks so that an expired claim
    /// counts as unclaimed.
    #[must_use]
    pub fn matches(&self, alert: &Alert, now: DateTime<Utc>) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&alert.status) {
            return false;
        }
        if self.severity.is_some_and(|s| s != alert.severity) {
            return false;
        }
        if self.patient_id.is_some_and(|p| p != alert.patient_id) {
            return false;
        }
        if self.rule_id.is_some() && self.rule_id != alert.rule_id {
            return false;
        }
        if self.suppressed.is_some_and(|s| s != alert.suppressed) {
            return false;
        }
        if self.created_after.is_some_and(|t| alert.created_at < t) {
            return false;
        }
        if self.created_before.is_some_and(|t| alert.created_at > t) {
            return false;
        }

        let holder = alert.live_holder(now);
        if self.unclaimed_only && holder.is_some() {
            return false;
        }
        if let Some(user) = self.claimed_by {
            if holder != Some(user) {
                return false;
            }
        }

        true
    }
}
