//! Alert records, claim leases, escalation events, and observations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AlertId, EscalationEventId, MetricId, OrgId, PatientId, RuleId, UserId};
use crate::rule::AlertRule;
use crate::types::{Actor, AlertStatus, Severity};

/// An exclusive, time-bounded lease held by one user on one alert.
///
/// A lease past `expires_at` is abandoned: reads treat the alert as
/// unclaimed and the next claim attempt may take it over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimLease {
    /// The user holding the lease.
    pub holder: UserId,
    /// When the lease was acquired.
    pub acquired_at: DateTime<Utc>,
    /// When the lease lapses without activity.
    pub expires_at: DateTime<Utc>,
}

impl ClaimLease {
    /// Returns true if the lease has lapsed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// A detected clinical condition requiring review.
///
/// Severity is captured from the rule at creation time; later rule
/// edits never alter it. Exactly one open alert may exist per
/// (patient, rule) pair; the evaluator refreshes the open alert
/// instead of creating a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique identifier.
    pub id: AlertId,
    /// Owning organization (the patient's organization).
    pub org_id: OrgId,
    /// The patient this alert concerns.
    pub patient_id: PatientId,
    /// The rule that produced the alert; `None` for manual alerts.
    pub rule_id: Option<RuleId>,
    /// Version of the rule at creation time.
    pub rule_version: Option<u32>,
    /// The metric that triggered the alert, if rule-generated.
    pub metric: Option<MetricId>,
    /// The value observed when the alert was created.
    pub observed_value: Option<f64>,
    /// The threshold in force at creation, if the rule had one.
    pub threshold: Option<f64>,
    /// Severity captured at creation.
    pub severity: Severity,
    /// Lifecycle state.
    pub status: AlertStatus,
    /// The current claim lease, if any.
    pub claim: Option<ClaimLease>,
    /// Queue visibility is suspended until this instant.
    pub snoozed_until: Option<DateTime<Utc>>,
    /// Administratively hidden from the triage queue.
    pub suppressed: bool,
    /// Mandatory documentation recorded at resolution.
    pub resolution_notes: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// When the alert was acknowledged, if it was.
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// Who acknowledged the alert.
    pub acknowledged_by: Option<UserId>,
    /// When the alert reached a terminal state.
    pub closed_at: Option<DateTime<Utc>>,
    /// Who resolved or cancelled the alert.
    pub closed_by: Option<UserId>,
    /// Deadline for first acknowledgement before SLA breach.
    pub first_sla_deadline: DateTime<Utc>,
    /// Current escalation level. Only ever increases.
    pub escalation_level: u32,
    /// When the triggering metric was last observed.
    pub last_observed_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Creates a pending alert from a rule match.
    #[must_use]
    pub fn from_rule(
        rule: &AlertRule,
        org_id: OrgId,
        patient_id: PatientId,
        observed_value: f64,
        first_sla_deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AlertId::new(),
            org_id,
            patient_id,
            rule_id: Some(rule.id),
            rule_version: Some(rule.version),
            metric: Some(rule.metric.clone()),
            observed_value: Some(observed_value),
            threshold: rule.condition.threshold_value(),
            severity: rule.severity,
            status: AlertStatus::Pending,
            claim: None,
            snoozed_until: None,
            suppressed: false,
            resolution_notes: None,
            created_at: now,
            acknowledged_at: None,
            acknowledged_by: None,
            closed_at: None,
            closed_by: None,
            first_sla_deadline,
            escalation_level: 0,
            last_observed_at: Some(now),
        }
    }

    /// Creates a manually entered alert (no originating rule).
    #[must_use]
    pub fn manual(
        org_id: OrgId,
        patient_id: PatientId,
        severity: Severity,
        first_sla_deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AlertId::new(),
            org_id,
            patient_id,
            rule_id: None,
            rule_version: None,
            metric: None,
            observed_value: None,
            threshold: None,
            severity,
            status: AlertStatus::Pending,
            claim: None,
            snoozed_until: None,
            suppressed: false,
            resolution_notes: None,
            created_at: now,
            acknowledged_at: None,
            acknowledged_by: None,
            closed_at: None,
            closed_by: None,
            first_sla_deadline,
            escalation_level: 0,
            last_observed_at: None,
        }
    }

    /// Returns true if the alert still needs action.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Returns true if the alert is snoozed at `now`.
    #[must_use]
    pub fn is_snoozed(&self, now: DateTime<Utc>) -> bool {
        self.snoozed_until.is_some_and(|until| until > now)
    }

    /// The live claim holder at `now`, ignoring expired leases.
    #[must_use]
    pub fn live_holder(&self, now: DateTime<Utc>) -> Option<UserId> {
        self.claim
            .as_ref()
            .filter(|lease| !lease.is_expired(now))
            .map(|lease| lease.holder)
    }

    /// Returns true if the alert should appear in the triage queue.
    #[must_use]
    pub fn queue_visible(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && !self.suppressed && !self.is_snoozed(now)
    }
}

/// One step in an alert's escalation history. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationEvent {
    /// Unique identifier.
    pub id: EscalationEventId,
    /// The alert that was escalated.
    pub alert_id: AlertId,
    /// Level before the escalation.
    pub from_level: u32,
    /// Level after the escalation.
    pub to_level: u32,
    /// Who or what triggered the escalation.
    pub triggered_by: Actor,
    /// Why the escalation happened.
    pub reason: String,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
}

impl EscalationEvent {
    /// Records an escalation step.
    #[must_use]
    pub fn new(
        alert_id: AlertId,
        from_level: u32,
        to_level: u32,
        triggered_by: Actor,
        reason: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EscalationEventId::new(),
            alert_id,
            from_level,
            to_level,
            triggered_by,
            reason: reason.into(),
            timestamp,
        }
    }
}

/// A clinical observation supplied by the ingestion collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// The patient's organization.
    pub org_id: OrgId,
    /// The patient the value belongs to.
    pub patient_id: PatientId,
    /// The metric recorded.
    pub metric: MetricId,
    /// The recorded value.
    pub value: f64,
    /// When the value was recorded.
    pub recorded_at: DateTime<Utc>,
}
