//! The triage engine facade.
//!
//! Wires the evaluator, lifecycle, queue, scheduler, and bulk
//! processor around shared stores, and adds rule management with the
//! clone-on-customize and immutability guards.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use vigil_audit::{AuditEvent, AuditKind, AuditLogger, TracingAuditLogger};
use vigil_core::{
    Alert, AlertId, AlertRule, EscalationEvent, Observation, PatientId, RuleCondition, RuleId,
    Severity, TriagePolicy,
};
use vigil_policy::{ActionKind, AuthContext, PolicyTable};
use vigil_store::{
    AlertQueryFilter, AlertRepository, MemoryAlertRepository, MemoryRuleRepository,
    ObservationLog, RuleRepository, StoreError,
};

use crate::bulk::{BulkOutcome, BulkProcessor, BulkRequest};
use crate::error::{EngineError, Result};
use crate::evaluator::{EvaluationReport, RuleEvaluator};
use crate::events::{DomainEvent, EventBus};
use crate::lifecycle::Lifecycle;
use crate::queue::{Page, QueuePage, QueueView, TriageQueue};
use crate::scheduler::{EscalationScheduler, SweepStats};

/// Partial edit applied to an existing rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleChanges {
    /// New name, if changing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New condition, if changing. The comparator is immutable once
    /// alerts reference the rule; the threshold value is not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<RuleCondition>,
    /// New severity, if changing. Immutable once referenced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Enable or disable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// How a rule deletion request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleRemoval {
    /// The rule had no referencing alerts and was removed.
    Removed,
    /// Alerts reference the rule; it was deactivated instead so their
    /// version lineage stays intact.
    Deactivated(AlertRule),
}

/// The stores and policies a [`TriageEngine`] is built from.
pub struct EngineParts {
    /// Alert repository.
    pub alerts: Arc<dyn AlertRepository>,
    /// Rule repository.
    pub rules: Arc<dyn RuleRepository>,
    /// Observation history.
    pub observations: Arc<ObservationLog>,
    /// Action policy table.
    pub table: Arc<PolicyTable>,
    /// Time policies.
    pub policy: TriagePolicy,
    /// Audit destination.
    pub audit: Arc<dyn AuditLogger>,
}

/// The alert lifecycle and triage engine.
pub struct TriageEngine {
    alerts: Arc<dyn AlertRepository>,
    rules: Arc<dyn RuleRepository>,
    table: Arc<PolicyTable>,
    policy: TriagePolicy,
    audit: Arc<dyn AuditLogger>,
    events: EventBus,
    evaluator: RuleEvaluator,
    lifecycle: Arc<Lifecycle>,
    queue: TriageQueue,
    scheduler: EscalationScheduler,
    bulk: BulkProcessor,
}

impl TriageEngine {
    /// Builds an engine from its parts.
    #[must_use]
    pub fn new(parts: EngineParts) -> Self {
        let events = EventBus::default();
        let evaluator = RuleEvaluator::new(
            Arc::clone(&parts.alerts),
            Arc::clone(&parts.rules),
            Arc::clone(&parts.observations),
            parts.policy,
            events.clone(),
        );
        let lifecycle = Arc::new(Lifecycle::new(
            Arc::clone(&parts.alerts),
            Arc::clone(&parts.table),
            parts.policy,
            Arc::clone(&parts.audit),
            events.clone(),
        ));
        let queue = TriageQueue::new(Arc::clone(&parts.alerts), parts.policy);
        let scheduler = EscalationScheduler::new(
            Arc::clone(&parts.alerts),
            parts.policy,
            events.clone(),
        );
        let bulk = BulkProcessor::new(
            Arc::clone(&lifecycle),
            Arc::clone(&parts.table),
            Arc::clone(&parts.audit),
        );

        Self {
            alerts: parts.alerts,
            rules: parts.rules,
            table: parts.table,
            policy: parts.policy,
            audit: parts.audit,
            events,
            evaluator,
            lifecycle,
            queue,
            scheduler,
            bulk,
        }
    }

    /// Builds an engine on in-memory stores with the default policy
    /// table and tracing audit log.
    #[must_use]
    pub fn in_memory(policy: TriagePolicy) -> Self {
        Self::new(EngineParts {
            alerts: Arc::new(MemoryAlertRepository::new()),
            rules: Arc::new(MemoryRuleRepository::new()),
            observations: Arc::new(ObservationLog::default()),
            table: Arc::new(PolicyTable::new()),
            policy,
            audit: Arc::new(TracingAuditLogger::new()),
        })
    }

    /// Subscribes to domain events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.events.subscribe()
    }

    /// The engine's time policies.
    #[must_use]
    pub const fn policy(&self) -> &TriagePolicy {
        &self.policy
    }

    // ---- evaluation ----

    /// Ingests a batch of observations from the trusted ingestion
    /// path and evaluates rules against them.
    pub fn ingest(&self, batch: &[Observation], now: DateTime<Utc>) -> EvaluationReport {
        self.evaluator.evaluate_batch(batch, now)
    }

    /// Manually triggers an evaluation pass: ingests the given batch,
    /// then runs the missing-data checks.
    ///
    /// # Errors
    ///
    /// Returns a policy error unless the caller is a coordinator or
    /// above.
    pub fn trigger_evaluation(
        &self,
        ctx: &AuthContext,
        batch: &[Observation],
        now: DateTime<Utc>,
    ) -> Result<EvaluationReport> {
        self.table
            .authorize(ActionKind::TriggerEvaluation, ctx, None, now)?;
        let mut report = self.evaluator.evaluate_batch(batch, now);
        report.absorb(self.evaluator.check_missing_data(now));
        Ok(report)
    }

    /// Runs the missing-data checks from the scheduler tick.
    pub fn check_missing_data(&self, now: DateTime<Utc>) -> EvaluationReport {
        self.evaluator.check_missing_data(now)
    }

    // ---- alerts ----

    /// Creates a manually entered alert for a patient. Open to every
    /// authenticated role.
    ///
    /// # Errors
    ///
    /// Returns a store error if the insert fails.
    pub fn create_manual_alert(
        &self,
        ctx: &AuthContext,
        patient_id: PatientId,
        severity: Severity,
        now: DateTime<Utc>,
    ) -> Result<Alert> {
        let deadline = self.policy.sla.first_deadline(severity, now);
        let alert = Alert::manual(ctx.org_id, patient_id, severity, deadline, now);
        let alert = self.alerts.insert(alert)?;
        self.events.publish(DomainEvent::AlertCreated {
            alert_id: alert.id,
            org_id: alert.org_id,
            severity: alert.severity,
        });
        Ok(alert)
    }

    /// Fetches one alert in the caller's organization.
    pub fn get_alert(&self, ctx: &AuthContext, alert_id: AlertId) -> Result<Alert> {
        self.lifecycle.get(ctx, alert_id, ActionKind::Claim)
    }

    /// Lists alerts in the caller's organization.
    #[must_use]
    pub fn list_alerts(
        &self,
        ctx: &AuthContext,
        filter: &AlertQueryFilter,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        self.alerts.list(ctx.org_id, filter, now)
    }

    /// Returns one page of the ranked triage queue.
    #[must_use]
    pub fn triage_queue(
        &self,
        ctx: &AuthContext,
        view: QueueView,
        page: Page,
        now: DateTime<Utc>,
    ) -> QueuePage {
        self.queue.page(ctx, view, page, now)
    }

    // ---- claims and lifecycle ----

    /// See [`Lifecycle::claim`].
    pub fn claim(&self, ctx: &AuthContext, alert_id: AlertId, now: DateTime<Utc>) -> Result<Alert> {
        self.lifecycle.claim(ctx, alert_id, now)
    }

    /// See [`Lifecycle::unclaim`].
    pub fn unclaim(&self, ctx: &AuthContext, alert_id: AlertId, now: DateTime<Utc>) -> Result<Alert> {
        self.lifecycle.unclaim(ctx, alert_id, now)
    }

    /// See [`Lifecycle::force_claim`].
    pub fn force_claim(
        &self,
        ctx: &AuthContext,
        alert_id: AlertId,
        now: DateTime<Utc>,
    ) -> Result<Alert> {
        self.lifecycle.force_claim(ctx, alert_id, now)
    }

    /// See [`Lifecycle::acknowledge`].
    pub fn acknowledge(
        &self,
        ctx: &AuthContext,
        alert_id: AlertId,
        now: DateTime<Utc>,
    ) -> Result<Alert> {
        self.lifecycle.acknowledge(ctx, alert_id, now)
    }

    /// See [`Lifecycle::resolve`].
    pub fn resolve(
        &self,
        ctx: &AuthContext,
        alert_id: AlertId,
        notes: &str,
        now: DateTime<Utc>,
    ) -> Result<Alert> {
        self.lifecycle.resolve(ctx, alert_id, notes, now)
    }

    /// See [`Lifecycle::cancel`].
    pub fn cancel(
        &self,
        ctx: &AuthContext,
        alert_id: AlertId,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Alert> {
        self.lifecycle.cancel(ctx, alert_id, reason, now)
    }

    /// See [`Lifecycle::snooze`].
    pub fn snooze(
        &self,
        ctx: &AuthContext,
        alert_id: AlertId,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Alert> {
        self.lifecycle.snooze(ctx, alert_id, until, now)
    }

    /// See [`Lifecycle::unsnooze`].
    pub fn unsnooze(&self, ctx: &AuthContext, alert_id: AlertId, now: DateTime<Utc>) -> Result<Alert> {
        self.lifecycle.unsnooze(ctx, alert_id, now)
    }

    /// See [`Lifecycle::suppress`].
    pub fn suppress(&self, ctx: &AuthContext, alert_id: AlertId, now: DateTime<Utc>) -> Result<Alert> {
        self.lifecycle.suppress(ctx, alert_id, now)
    }

    /// See [`Lifecycle::unsuppress`].
    pub fn unsuppress(&self, ctx: &AuthContext, alert_id: AlertId, now: DateTime<Utc>) -> Result<Alert> {
        self.lifecycle.unsuppress(ctx, alert_id, now)
    }

    /// See [`Lifecycle::escalate`].
    pub fn escalate(
        &self,
        ctx: &AuthContext,
        alert_id: AlertId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Alert> {
        self.lifecycle.escalate(ctx, alert_id, reason, now)
    }

    /// See [`Lifecycle::escalation_history`].
    pub fn escalation_history(
        &self,
        ctx: &AuthContext,
        alert_id: AlertId,
    ) -> Result<Vec<EscalationEvent>> {
        self.lifecycle.escalation_history(ctx, alert_id)
    }

    // ---- bulk ----

    /// Applies a bulk action. See [`BulkProcessor::process`].
    pub fn bulk(
        &self,
        ctx: &AuthContext,
        request: &BulkRequest,
        now: DateTime<Utc>,
    ) -> Result<BulkOutcome> {
        self.bulk.process(ctx, request, now)
    }

    // ---- sweeps ----

    /// Escalates pending alerts past their deadline.
    pub fn run_escalation_sweep(
        &self,
        now: DateTime<Utc>,
        budget: Option<std::time::Duration>,
    ) -> SweepStats {
        self.scheduler.run_escalation_sweep(now, budget)
    }

    /// Clears lapsed snoozes.
    pub fn run_snooze_sweep(
        &self,
        now: DateTime<Utc>,
        budget: Option<std::time::Duration>,
    ) -> SweepStats {
        self.scheduler.run_snooze_sweep(now, budget)
    }

    /// Reclaims expired claim leases.
    pub fn run_lease_sweep(
        &self,
        now: DateTime<Utc>,
        budget: Option<std::time::Duration>,
    ) -> SweepStats {
        self.scheduler.run_lease_sweep(now, budget)
    }

    // ---- rules ----

    /// Registers a rule. The rule's organization must be the caller's
    /// own or `None` is rejected for non-platform callers; callers
    /// register org-scoped rules only.
    ///
    /// # Errors
    ///
    /// Returns a policy error below the admin floor, or a validation
    /// error for a rule scoped to another organization.
    pub fn create_rule(
        &self,
        ctx: &AuthContext,
        rule: AlertRule,
        now: DateTime<Utc>,
    ) -> Result<AlertRule> {
        self.table.authorize(ActionKind::ManageRules, ctx, None, now)?;
        if rule.org_id != Some(ctx.org_id) {
            return Err(EngineError::validation(
                "rules must be scoped to the caller's organization",
            ));
        }
        Ok(self.rules.insert(rule)?)
    }

    /// Fetches a rule visible to the caller: standardized or owned by
    /// the caller's organization. Other tenants' rules read as absent.
    pub fn get_rule(&self, ctx: &AuthContext, rule_id: RuleId) -> Result<AlertRule> {
        let rule = self.rules.get(rule_id)?;
        if rule.org_id.is_some_and(|org| org != ctx.org_id) {
            return Err(StoreError::RuleNotFound(rule_id).into());
        }
        Ok(rule)
    }

    /// Lists the rules visible to the caller's organization.
    #[must_use]
    pub fn list_rules(&self, ctx: &AuthContext) -> Vec<AlertRule> {
        self.rules.list(Some(ctx.org_id))
    }

    /// The enabled rules currently in effect for the caller's
    /// organization, after clone shadowing.
    #[must_use]
    pub fn effective_rules(&self, ctx: &AuthContext) -> Vec<AlertRule> {
        self.rules.effective_rules(ctx.org_id, None)
    }

    /// Edits an org-scoped rule, bumping its version.
    ///
    /// Once alerts reference the rule its severity and comparator are
    /// frozen; the threshold value, name, and enabled flag stay
    /// editable. Standardized rules are customized per organization
    /// via [`customize_rule`](Self::customize_rule), never edited.
    pub fn update_rule(
        &self,
        ctx: &AuthContext,
        rule_id: RuleId,
        changes: &RuleChanges,
        now: DateTime<Utc>,
    ) -> Result<AlertRule> {
        self.table.authorize(ActionKind::ManageRules, ctx, None, now)?;
        let existing = self.get_rule(ctx, rule_id)?;
        if existing.is_standardized() {
            return Err(EngineError::validation(
                "standardized rules are customized per organization, not edited",
            ));
        }

        let referenced = self.alerts.references_rule(rule_id);
        if referenced {
            if changes.severity.is_some_and(|s| s != existing.severity) {
                return Err(EngineError::RuleReferenced(rule_id));
            }
            if let Some(condition) = &changes.condition {
                if condition.comparator() != existing.condition.comparator() {
                    return Err(EngineError::RuleReferenced(rule_id));
                }
            }
        }

        let name = changes.name.clone().unwrap_or_else(|| existing.name.clone());
        let condition = changes
            .condition
            .clone()
            .unwrap_or_else(|| existing.condition.clone());
        let severity = changes.severity.unwrap_or(existing.severity);
        let enabled = changes.enabled.unwrap_or(existing.enabled);

        // Revalidate the whole rule through the builder.
        let validated = AlertRule::builder(name, existing.metric.clone(), condition)
            .org(ctx.org_id)
            .severity(severity)
            .enabled(enabled)
            .build()
            .map_err(|err| EngineError::validation(err.to_string()))?;

        let updated = self.rules.update(rule_id, &mut |rule| {
            rule.name.clone_from(&validated.name);
            rule.condition = validated.condition.clone();
            rule.severity = validated.severity;
            rule.enabled = validated.enabled;
        })?;

        info!(rule_id = %rule_id, version = updated.version, "rule updated");
        Ok(updated)
    }

    /// Clones a standardized rule into the caller's organization so it
    /// can be tuned without affecting other tenants.
    pub fn customize_rule(
        &self,
        ctx: &AuthContext,
        rule_id: RuleId,
        now: DateTime<Utc>,
    ) -> Result<AlertRule> {
        self.table.authorize(ActionKind::ManageRules, ctx, None, now)?;
        let rule = self.get_rule(ctx, rule_id)?;
        if !rule.is_standardized() {
            return Err(EngineError::validation(
                "only standardized rules can be customized",
            ));
        }
        Ok(self.rules.insert(rule.clone_for_org(ctx.org_id))?)
    }

    /// Deletes an org-scoped rule, or deactivates it when alerts still
    /// reference it so their version lineage stays intact.
    pub fn delete_rule(
        &self,
        ctx: &AuthContext,
        rule_id: RuleId,
        now: DateTime<Utc>,
    ) -> Result<RuleRemoval> {
        self.table.authorize(ActionKind::ManageRules, ctx, None, now)?;
        let existing = self.get_rule(ctx, rule_id)?;
        if existing.is_standardized() {
            return Err(EngineError::validation(
                "standardized rules cannot be deleted by an organization",
            ));
        }

        if self.alerts.references_rule(rule_id) {
            let deactivated = self.rules.deactivate(rule_id)?;
            self.audit.log(&AuditEvent::new(AuditKind::RuleDeactivated {
                rule_id,
                user_id: ctx.user_id,
            }));
            return Ok(RuleRemoval::Deactivated(deactivated));
        }

        self.rules.remove(rule_id)?;
        Ok(RuleRemoval::Removed)
    }
}
