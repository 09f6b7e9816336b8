//! Alert repository: storage, org scoping, and claim coordination.
//!
//! All claim operations are linearized behind a single write lock, so
//! when several clinicians race to claim the same alert exactly one
//! wins and the rest observe [`StoreError::AlreadyClaimed`]. Expired
//! leases are reclaimed lazily at the next claim attempt; no sweep is
//! required for correctness.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tracing::debug;

use vigil_core::{Alert, AlertId, ClaimLease, EscalationEvent, OrgId, PatientId, RuleId, UserId};

use crate::error::{Result, StoreError};
use crate::filter::AlertQueryFilter;

/// Outcome of a supervisor claim transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceClaimOutcome {
    /// The alert after the transfer.
    pub alert: Alert,
    /// The user whose live lease was displaced, if any.
    pub displaced: Option<UserId>,
}

/// Storage boundary for alerts and their escalation histories.
///
/// Implementations must apply each mutation atomically: concurrent
/// callers never observe a partially updated alert, and claim
/// acquisition is compare-and-set.
pub trait AlertRepository: Send + Sync {
    /// Inserts a new alert.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateOpenAlert`] if a rule-generated
    /// alert would duplicate an existing open alert for the same
    /// (patient, rule) pair.
    fn insert(&self, alert: Alert) -> Result<Alert>;

    /// Fetches an alert, verifying organization ownership.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlertNotFound`] if the id is unknown, or
    /// [`StoreError::OrganizationAccessDenied`] if the alert belongs
    /// to another organization.
    fn get(&self, caller_org: OrgId, alert_id: AlertId) -> Result<Alert>;

    /// Finds the open alert for a (patient, rule) pair, if one exists.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` keeps the trait uniform for
    /// fallible backends.
    fn find_open(
        &self,
        caller_org: OrgId,
        patient_id: PatientId,
        rule_id: RuleId,
    ) -> Result<Option<Alert>>;

    /// Lists alerts in the caller's organization matching the filter,
    /// ordered by creation time then id.
    fn list(&self, caller_org: OrgId, filter: &AlertQueryFilter, now: DateTime<Utc>) -> Vec<Alert>;

    /// Applies a mutation to an alert under the write lock.
    ///
    /// The mutation either succeeds completely or leaves the alert
    /// untouched. A terminal alert leaves the open index and has its
    /// claim cleared regardless of what the closure did.
    ///
    /// # Errors
    ///
    /// Returns lookup and scoping errors as [`get`](Self::get) does,
    /// plus whatever the closure returns.
    fn update(
        &self,
        caller_org: OrgId,
        alert_id: AlertId,
        mutate: &mut dyn FnMut(&mut Alert) -> Result<()>,
    ) -> Result<Alert>;

    /// Attempts to acquire the claim lease for `user`.
    ///
    /// Succeeds if the alert is unclaimed or its lease has expired; a
    /// repeat claim by the current holder renews the lease.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyClaimed`] if another user holds a
    /// live lease.
    fn try_claim(
        &self,
        caller_org: OrgId,
        alert_id: AlertId,
        user: UserId,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Alert>;

    /// Releases the claim lease held by `user`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotHolder`] if `user` does not hold a
    /// live lease on the alert.
    fn release_claim(
        &self,
        caller_org: OrgId,
        alert_id: AlertId,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Alert>;

    /// Transfers the claim to `user` regardless of the current holder.
    ///
    /// The outcome reports the displaced holder so the caller can
    /// record the audit event.
    ///
    /// # Errors
    ///
    /// Returns lookup and scoping errors as [`get`](Self::get) does.
    fn force_claim(
        &self,
        caller_org: OrgId,
        alert_id: AlertId,
        user: UserId,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<ForceClaimOutcome>;

    /// Appends an escalation event to an alert's history.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlertNotFound`] if the alert is unknown.
    fn append_escalation(&self, event: EscalationEvent) -> Result<()>;

    /// Returns an alert's escalation history in chronological order.
    ///
    /// # Errors
    ///
    /// Returns lookup and scoping errors as [`get`](Self::get) does.
    fn escalation_history(
        &self,
        caller_org: OrgId,
        alert_id: AlertId,
    ) -> Result<Vec<EscalationEvent>>;

    /// Returns every open alert across all organizations.
    ///
    /// Used by system sweeps (escalation, snooze expiry, lease
    /// expiry), which run outside any caller's tenant scope.
    fn open_alerts(&self) -> Vec<Alert>;

    /// Returns true if any alert references the rule.
    fn references_rule(&self, rule_id: RuleId) -> bool;
}

#[derive(Debug, Default)]
struct Inner {
    alerts: HashMap<AlertId, Alert>,
    /// Open alert per (patient, rule). Entries are removed when the
    /// alert leaves the open states.
    open_index: HashMap<(PatientId, RuleId), AlertId>,
    escalations: HashMap<AlertId, Vec<EscalationEvent>>,
}

/// In-memory alert repository.
#[derive(Debug, Default)]
pub struct MemoryAlertRepository {
    inner: RwLock<Inner>,
}

impl MemoryAlertRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of alerts stored, open or closed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().alerts.len()
    }

    /// Returns true if no alerts are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().alerts.is_empty()
    }

    fn scoped<'a>(
        alerts: &'a HashMap<AlertId, Alert>,
        caller_org: OrgId,
        alert_id: AlertId,
    ) -> Result<&'a Alert> {
        let alert = alerts
            .get(&alert_id)
            .ok_or(StoreError::AlertNotFound(alert_id))?;
        if alert.org_id != caller_org {
            return Err(StoreError::OrganizationAccessDenied {
                alert_id,
                caller_org,
                target_org: alert.org_id,
            });
        }
        Ok(alert)
    }

    fn scoped_mut<'a>(
        alerts: &'a mut HashMap<AlertId, Alert>,
        caller_org: OrgId,
        alert_id: AlertId,
    ) -> Result<&'a mut Alert> {
        let alert = alerts
            .get_mut(&alert_id)
            .ok_or(StoreError::AlertNotFound(alert_id))?;
        if alert.org_id != caller_org {
            return Err(StoreError::OrganizationAccessDenied {
                alert_id,
                caller_org,
                target_org: alert.org_id,
            });
        }
        Ok(alert)
    }

    /// Restores invariants after a mutation: terminal alerts carry no
    /// claim and no snooze, and leave the open index.
    fn settle(inner: &mut Inner, alert_id: AlertId) {
        let Some(alert) = inner.alerts.get_mut(&alert_id) else {
            return;
        };
        if alert.is_open() {
            return;
        }
        alert.claim = None;
        alert.snoozed_until = None;
        if let Some(rule_id) = alert.rule_id {
            let key = (alert.patient_id, rule_id);
            if inner.open_index.get(&key) == Some(&alert_id) {
                inner.open_index.remove(&key);
            }
        }
    }
}

impl AlertRepository for MemoryAlertRepository {
    fn insert(&self, alert: Alert) -> Result<Alert> {
        let mut inner = self.inner.write();

        if let Some(rule_id) = alert.rule_id {
            let key = (alert.patient_id, rule_id);
            if let Some(&existing) = inner.open_index.get(&key) {
                // Stale index entries cannot occur: closing an alert
                // removes its entry under the same lock.
                return Err(StoreError::DuplicateOpenAlert {
                    patient_id: alert.patient_id,
                    rule_id,
                    existing,
                });
            }
            if alert.is_open() {
                inner.open_index.insert(key, alert.id);
            }
        }

        debug!(alert_id = %alert.id, org_id = %alert.org_id, severity = %alert.severity, "alert stored");
        inner.alerts.insert(alert.id, alert.clone());
        Ok(alert)
    }

    fn get(&self, caller_org: OrgId, alert_id: AlertId) -> Result<Alert> {
        let inner = self.inner.read();
        Self::scoped(&inner.alerts, caller_org, alert_id).cloned()
    }

    fn find_open(
        &self,
        caller_org: OrgId,
        patient_id: PatientId,
        rule_id: RuleId,
    ) -> Result<Option<Alert>> {
        let inner = self.inner.read();
        let found = inner
            .open_index
            .get(&(patient_id, rule_id))
            .and_then(|id| inner.alerts.get(id))
            .filter(|alert| alert.org_id == caller_org)
            .cloned();
        Ok(found)
    }

    fn list(&self, caller_org: OrgId, filter: &AlertQueryFilter, now: DateTime<Utc>) -> Vec<Alert> {
        let inner = self.inner.read();
        let mut matched: Vec<Alert> = inner
            .alerts
            .values()
            .filter(|alert| alert.org_id == caller_org && filter.matches(alert, now))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        matched
    }

    fn update(
        &self,
        caller_org: OrgId,
        alert_id: AlertId,
        mutate: &mut dyn FnMut(&mut Alert) -> Result<()>,
    ) -> Result<Alert> {
        let mut inner = self.inner.write();

        let alert = Self::scoped_mut(&mut inner.alerts, caller_org, alert_id)?;
        let mut candidate = alert.clone();
        mutate(&mut candidate)?;
        *alert = candidate;

        Self::settle(&mut inner, alert_id);
        inner
            .alerts
            .get(&alert_id)
            .cloned()
            .ok_or(StoreError::AlertNotFound(alert_id))
    }

    fn try_claim(
        &self,
        caller_org: OrgId,
        alert_id: AlertId,
        user: UserId,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Alert> {
        let mut inner = self.inner.write();
        let alert = Self::scoped_mut(&mut inner.alerts, caller_org, alert_id)?;

        if !alert.is_open() {
            return Err(StoreError::InvalidTransition {
                status: alert.status,
                action: vigil_policy::ActionKind::Claim,
            });
        }

        match &alert.claim {
            Some(existing) if !existing.is_expired(now) && existing.holder != user => {
                return Err(StoreError::AlreadyClaimed {
                    alert_id,
                    holder: existing.holder,
                });
            }
            Some(existing) if existing.is_expired(now) => {
                debug!(
                    %alert_id,
                    expired_holder = %existing.holder,
                    new_holder = %user,
                    "expired lease reclaimed"
                );
            }
            _ => {}
        }

        alert.claim = Some(ClaimLease {
            holder: user,
            acquired_at: now,
            expires_at: now + lease,
        });
        Ok(alert.clone())
    }

    fn release_claim(
        &self,
        caller_org: OrgId,
        alert_id: AlertId,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Alert> {
        let mut inner = self.inner.write();
        let alert = Self::scoped_mut(&mut inner.alerts, caller_org, alert_id)?;

        match alert.live_holder(now) {
            Some(holder) if holder == user => {
                alert.claim = None;
                Ok(alert.clone())
            }
            holder => Err(StoreError::NotHolder { alert_id, holder }),
        }
    }

    fn force_claim(
        &self,
        caller_org: OrgId,
        alert_id: AlertId,
        user: UserId,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<ForceClaimOutcome> {
        let mut inner = self.inner.write();
        let alert = Self::scoped_mut(&mut inner.alerts, caller_org, alert_id)?;

        if !alert.is_open() {
            return Err(StoreError::InvalidTransition {
                status: alert.status,
                action: vigil_policy::ActionKind::ForceClaim,
            });
        }

        let displaced = alert.live_holder(now).filter(|holder| *holder != user);
        alert.claim = Some(ClaimLease {
            holder: user,
            acquired_at: now,
            expires_at: now + lease,
        });

        Ok(ForceClaimOutcome {
            alert: alert.clone(),
            displaced,
        })
    }

    fn append_escalation(&self, event: EscalationEvent) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.alerts.contains_key(&event.alert_id) {
            return Err(StoreError::AlertNotFound(event.alert_id));
        }
        inner
            .escalations
            .entry(event.alert_id)
            .or_default()
            .push(event);
        Ok(())
    }

    fn escalation_history(
        &self,
        caller_org: OrgId,
        alert_id: AlertId,
    ) -> Result<Vec<EscalationEvent>> {
        let inner = self.inner.read();
        Self::scoped(&inner.alerts, caller_org, alert_id)?;
        Ok(inner.escalations.get(&alert_id).cloned().unwrap_or_default())
    }

    fn open_alerts(&self) -> Vec<Alert> {
        let inner = self.inner.read();
        let mut open: Vec<Alert> = inner
            .alerts
            .values()
            .filter(|alert| alert.is_open())
            .cloned()
            .collect();
        open.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        open
    }

    fn references_rule(&self, rule_id: RuleId) -> bool {
        let inner = self.inner.read();
        inner
            .alerts
            .values()
            .any(|alert| alert.rule_id == Some(rule_id))
    }
}
