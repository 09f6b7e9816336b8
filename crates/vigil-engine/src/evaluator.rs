//! Rule evaluation over incoming observations.
//!
//! Each observation is evaluated against the effective rules for its
//! organization and metric. A breach opens a new alert unless an open
//! alert already covers the (patient, rule) pair, in which case the
//! open alert is refreshed; re-running a batch is therefore
//! idempotent. One bad item never aborts the batch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use vigil_core::{
    Alert, AlertId, AlertRule, ConditionOutcome, EvalContext, MetricId, Observation, OrgId,
    PatientId, RuleCondition, TriagePolicy,
};
use vigil_store::{AlertRepository, ObservationLog, RuleRepository, StoreError};

use crate::events::{DomainEvent, EventBus};

/// What one evaluator pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationReport {
    /// Observations (or scheduled checks) examined.
    pub processed: usize,
    /// Alerts opened by this pass.
    pub alerts_created: Vec<AlertId>,
    /// Open alerts refreshed by repeat breaches.
    pub alerts_refreshed: Vec<AlertId>,
    /// Items that failed, with the reason. Failures never abort the
    /// rest of the batch.
    pub failures: Vec<EvaluationFailure>,
}

impl EvaluationReport {
    /// Merges another report into this one.
    pub fn absorb(&mut self, other: Self) {
        self.processed += other.processed;
        self.alerts_created.extend(other.alerts_created);
        self.alerts_refreshed.extend(other.alerts_refreshed);
        self.failures.extend(other.failures);
    }
}

/// One failed evaluation item.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationFailure {
    /// The patient involved.
    pub patient_id: PatientId,
    /// The metric involved, when known.
    pub metric: Option<MetricId>,
    /// Why the item failed.
    pub reason: String,
}

/// Evaluates rules against observations and opens alerts on breaches.
pub struct RuleEvaluator {
    alerts: Arc<dyn AlertRepository>,
    rules: Arc<dyn RuleRepository>,
    observations: Arc<ObservationLog>,
    policy: TriagePolicy,
    events: EventBus,
}

impl RuleEvaluator {
    /// Wires an evaluator to its stores.
    #[must_use]
    pub fn new(
        alerts: Arc<dyn AlertRepository>,
        rules: Arc<dyn RuleRepository>,
        observations: Arc<ObservationLog>,
        policy: TriagePolicy,
        events: EventBus,
    ) -> Self {
        Self {
            alerts,
            rules,
            observations,
            policy,
            events,
        }
    }

    /// Evaluates a batch of observations.
    ///
    /// Observations are recorded into the history log first so trend
    /// conditions see the incoming value.
    pub fn evaluate_batch(&self, batch: &[Observation], now: DateTime<Utc>) -> EvaluationReport {
        let mut report = EvaluationReport::default();

        for observation in batch {
            self.observations.record(observation);
            report.processed += 1;

            let rules = self
                .rules
                .effective_rules(observation.org_id, Some(&observation.metric));

            for rule in rules {
                // Missing-data rules fire on scheduled checks, not on
                // arriving values.
                if matches!(rule.condition, RuleCondition::MissingData { .. }) {
                    continue;
                }

                let history = self.observations.history(
                    observation.org_id,
                    observation.patient_id,
                    &observation.metric,
                );
                let cx = EvalContext {
                    value: Some(observation.value),
                    history: &history,
                    last_recorded_at: self.observations.last_recorded_at(
                        observation.org_id,
                        observation.patient_id,
                        &observation.metric,
                    ),
                    now,
                };

                if let ConditionOutcome::Breached(value) = rule.condition.evaluate(&cx) {
                    self.open_or_refresh(
                        &rule,
                        observation.org_id,
                        observation.patient_id,
                        value,
                        observation.recorded_at,
                        now,
                        &mut report,
                    );
                }
            }
        }

        report
    }

    /// Evaluates missing-data rules across every known series.
    ///
    /// Absence of data cannot be observed per-observation, so this
    /// runs from the scheduler tick.
    pub fn check_missing_data(&self, now: DateTime<Utc>) -> EvaluationReport {
        let mut report = EvaluationReport::default();

        for org_id in self.observations.organizations() {
            let rules: Vec<AlertRule> = self
                .rules
                .effective_rules(org_id, None)
                .into_iter()
                .filter(|rule| matches!(rule.condition, RuleCondition::MissingData { .. }))
                .collect();
            if rules.is_empty() {
                continue;
            }

            for (patient_id, metric) in self.observations.tracked_series(org_id) {
                for rule in rules.iter().filter(|rule| rule.metric == metric) {
                    report.processed += 1;

                    let last = self.observations.last_recorded_at(org_id, patient_id, &metric);
                    let cx = EvalContext {
                        value: None,
                        history: &[],
                        last_recorded_at: last,
                        now,
                    };

                    if let ConditionOutcome::Breached(gap) = rule.condition.evaluate(&cx) {
                        self.open_or_refresh(
                            rule, org_id, patient_id, gap, now, now, &mut report,
                        );
                    }
                }
            }
        }

        report
    }

    #[allow(clippy::too_many_arguments)]
    fn open_or_refresh(
        &self,
        rule: &AlertRule,
        org_id: OrgId,
        patient_id: PatientId,
        value: f64,
        observed_at: DateTime<Utc>,
        now: DateTime<Utc>,
        report: &mut EvaluationReport,
    ) {
        match self.alerts.find_open(org_id, patient_id, rule.id) {
            Ok(Some(existing)) => {
                self.refresh(existing.id, org_id, patient_id, rule, value, observed_at, report);
            }
            Ok(None) => {
                let deadline = self.policy.sla.first_deadline(rule.severity, now);
                let alert = Alert::from_rule(rule, org_id, patient_id, value, deadline, now);
                match self.alerts.insert(alert) {
                    Ok(alert) => {
                        debug!(alert_id = %alert.id, rule_id = %rule.id, %patient_id, "alert opened");
                        self.events.publish(DomainEvent::AlertCreated {
                            alert_id: alert.id,
                            org_id,
                            severity: alert.severity,
                        });
                        report.alerts_created.push(alert.id);
                    }
                    // Lost a race with a concurrent insert for the same
                    // pair; fold into the existing alert.
                    Err(StoreError::DuplicateOpenAlert { existing, .. }) => {
                        self.refresh(existing, org_id, patient_id, rule, value, observed_at, report);
                    }
                    Err(err) => {
                        warn!(rule_id = %rule.id, %patient_id, error = %err, "alert insert failed");
                        report.failures.push(EvaluationFailure {
                            patient_id,
                            metric: Some(rule.metric.clone()),
                            reason: err.to_string(),
                        });
                    }
                }
            }
            Err(err) => {
                report.failures.push(EvaluationFailure {
                    patient_id,
                    metric: Some(rule.metric.clone()),
                    reason: err.to_string(),
                });
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn refresh(
        &self,
        alert_id: AlertId,
        org_id: OrgId,
        patient_id: PatientId,
        rule: &AlertRule,
        value: f64,
        observed_at: DateTime<Utc>,
        report: &mut EvaluationReport,
    ) {
        let refreshed = self.alerts.update(org_id, alert_id, &mut |alert| {
            alert.observed_value = Some(value);
            alert.last_observed_at = Some(observed_at);
            Ok(())
        });
        match refreshed {
            Ok(alert) => {
                self.events.publish(DomainEvent::AlertRefreshed { alert_id: alert.id });
                report.alerts_refreshed.push(alert.id);
            }
            Err(err) => {
                report.failures.push(EvaluationFailure {
                    patient_id,
                    metric: Some(rule.metric.clone()),
                    reason: err.to_string(),
                });
            }
        }
    }
}
