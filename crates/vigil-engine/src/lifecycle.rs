//! The alert state machine and claim workflow.
//!
//! Every operation runs the same sequence: resolve the alert under the
//! caller's organization scope (recording an audit event on a
//! cross-tenant attempt), check the policy table, then apply the
//! transition atomically through the repository. Illegal transitions
//! come back as conflicts, never silent no-ops.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use vigil_audit::{AuditEvent, AuditKind, AuditLogger};
use vigil_core::{
    Actor, Alert, AlertId, AlertStatus, EscalationEvent, TriagePolicy,
};
use vigil_policy::{ActionKind, AuthContext, PolicyTable};
use vigil_store::{AlertRepository, StoreError};

use crate::error::{EngineError, Result};
use crate::events::{DomainEvent, EventBus};

/// Applies claims and lifecycle transitions to alerts.
pub struct Lifecycle {
    alerts: Arc<dyn AlertRepository>,
    table: Arc<PolicyTable>,
    policy: TriagePolicy,
    audit: Arc<dyn AuditLogger>,
    events: EventBus,
}

impl Lifecycle {
    /// Wires the lifecycle service to its collaborators.
    #[must_use]
    pub fn new(
        alerts: Arc<dyn AlertRepository>,
        table: Arc<PolicyTable>,
        policy: TriagePolicy,
        audit: Arc<dyn AuditLogger>,
        events: EventBus,
    ) -> Self {
        Self {
            alerts,
            table,
            policy,
            audit,
            events,
        }
    }

    /// Fetches an alert in the caller's scope, recording an audit
    /// event when the caller reached across tenants.
    pub fn get(&self, ctx: &AuthContext, alert_id: AlertId, action: ActionKind) -> Result<Alert> {
        self.alerts
            .get(ctx.org_id, alert_id)
            .map_err(|err| self.noted(err, ctx, action))
    }

    /// Takes the exclusive claim on an alert.
    ///
    /// Exactly one of several racing callers wins; the rest receive
    /// [`StoreError::AlreadyClaimed`]. A repeat claim by the holder
    /// renews the lease, and an expired lease is taken over silently.
    pub fn claim(&self, ctx: &AuthContext, alert_id: AlertId, now: DateTime<Utc>) -> Result<Alert> {
        self.table.authorize(ActionKind::Claim, ctx, None, now)?;
        let alert = self
            .alerts
            .try_claim(
                ctx.org_id,
                alert_id,
                ctx.user_id,
                self.policy.claim.lease_duration(),
                now,
            )
            .map_err(|err| self.noted(err, ctx, ActionKind::Claim))?;

        info!(%alert_id, user_id = %ctx.user_id, "alert claimed");
        self.events.publish(DomainEvent::Claimed {
            alert_id,
            user_id: ctx.user_id,
        });
        Ok(alert)
    }

    /// Releases the caller's own claim.
    pub fn unclaim(&self, ctx: &AuthContext, alert_id: AlertId, now: DateTime<Utc>) -> Result<Alert> {
        self.table.authorize(ActionKind::Unclaim, ctx, None, now)?;
        let alert = self
            .alerts
            .release_claim(ctx.org_id, alert_id, ctx.user_id, now)
            .map_err(|err| self.noted(err, ctx, ActionKind::Unclaim))?;

        self.events.publish(DomainEvent::Unclaimed { alert_id });
        Ok(alert)
    }

    /// Transfers the claim to the caller regardless of the holder.
    /// Displacing a live holder records an audit event.
    pub fn force_claim(
        &self,
        ctx: &AuthContext,
        alert_id: AlertId,
        now: DateTime<Utc>,
    ) -> Result<Alert> {
        self.table.authorize(ActionKind::ForceClaim, ctx, None, now)?;
        let outcome = self
            .alerts
            .force_claim(
                ctx.org_id,
                alert_id,
                ctx.user_id,
                self.policy.claim.lease_duration(),
                now,
            )
            .map_err(|err| self.noted(err, ctx, ActionKind::ForceClaim))?;

        if let Some(displaced) = outcome.displaced {
            self.audit.log(&AuditEvent::new(AuditKind::ClaimDisplaced {
                alert_id,
                displaced,
                new_holder: ctx.user_id,
            }));
        }
        self.events.publish(DomainEvent::ClaimTransferred {
            alert_id,
            from: outcome.displaced,
            to: ctx.user_id,
        });
        Ok(outcome.alert)
    }

    /// Acknowledges a pending alert, stopping its SLA clock.
    pub fn acknowledge(
        &self,
        ctx: &AuthContext,
        alert_id: AlertId,
        now: DateTime<Utc>,
    ) -> Result<Alert> {
        let current = self.get(ctx, alert_id, ActionKind::Acknowledge)?;
        self.table
            .authorize(ActionKind::Acknowledge, ctx, Some(&current), now)?;

        let user_id = ctx.user_id;
        let alert = self.alerts.update(ctx.org_id, alert_id, &mut |alert| {
            if alert.status != AlertStatus::Pending {
                return Err(StoreError::InvalidTransition {
                    status: alert.status,
                    action: ActionKind::Acknowledge,
                });
            }
            alert.status = AlertStatus::Acknowledged;
            alert.acknowledged_at = Some(now);
            alert.acknowledged_by = Some(user_id);
            Ok(())
        })?;

        info!(%alert_id, user_id = %ctx.user_id, "alert acknowledged");
        self.events.publish(DomainEvent::Acknowledged { alert_id, user_id });
        Ok(alert)
    }

    /// Resolves an open alert. Notes are mandatory and must be
    /// non-empty after trimming.
    pub fn resolve(
        &self,
        ctx: &AuthContext,
        alert_id: AlertId,
        notes: &str,
        now: DateTime<Utc>,
    ) -> Result<Alert> {
        let notes = notes.trim();
        if notes.is_empty() {
            return Err(EngineError::validation("resolution notes must not be empty"));
        }

        let current = self.get(ctx, alert_id, ActionKind::Resolve)?;
        self.table.authorize(ActionKind::Resolve, ctx, Some(&current), now)?;

        let user_id = ctx.user_id;
        let alert = self.alerts.update(ctx.org_id, alert_id, &mut |alert| {
            if !alert.is_open() {
                return Err(StoreError::InvalidTransition {
                    status: alert.status,
                    action: ActionKind::Resolve,
                });
            }
            alert.status = AlertStatus::Resolved;
            alert.resolution_notes = Some(notes.to_string());
            alert.closed_at = Some(now);
            alert.closed_by = Some(user_id);
            Ok(())
        })?;

        info!(%alert_id, user_id = %ctx.user_id, "alert resolved");
        self.events.publish(DomainEvent::Resolved { alert_id, user_id });
        Ok(alert)
    }

    /// Cancels an open alert (false positive, duplicate entry). An
    /// optional reason lands in the notes.
    pub fn cancel(
        &self,
        ctx: &AuthContext,
        alert_id: AlertId,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Alert> {
        let current = self.get(ctx, alert_id, ActionKind::Cancel)?;
        self.table.authorize(ActionKind::Cancel, ctx, Some(&current), now)?;

        let user_id = ctx.user_id;
        let reason = reason.map(str::trim).filter(|r| !r.is_empty()).map(String::from);
        let alert = self.alerts.update(ctx.org_id, alert_id, &mut |alert| {
            if !alert.is_open() {
                return Err(StoreError::InvalidTransition {
                    status: alert.status,
                    action: ActionKind::Cancel,
                });
            }
            alert.status = AlertStatus::Cancelled;
            alert.resolution_notes.clone_from(&reason);
            alert.closed_at = Some(now);
            alert.closed_by = Some(user_id);
            Ok(())
        })?;

        info!(%alert_id, user_id = %ctx.user_id, "alert cancelled");
        self.events.publish(DomainEvent::Cancelled { alert_id, user_id });
        Ok(alert)
    }

    /// Suspends queue visibility until `until`. Status is untouched;
    /// the snooze window is bounded by policy.
    pub fn snooze(
        &self,
        ctx: &AuthContext,
        alert_id: AlertId,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Alert> {
        self.policy
            .snooze
            .validate(until, now)
            .map_err(|err| EngineError::validation(err.to_string()))?;

        let current = self.get(ctx, alert_id, ActionKind::Snooze)?;
        self.table.authorize(ActionKind::Snooze, ctx, Some(&current), now)?;

        let alert = self.alerts.update(ctx.org_id, alert_id, &mut |alert| {
            if !alert.is_open() {
                return Err(StoreError::InvalidTransition {
                    status: alert.status,
                    action: ActionKind::Snooze,
                });
            }
            alert.snoozed_until = Some(until);
            Ok(())
        })?;

        self.events.publish(DomainEvent::Snoozed { alert_id, until });
        Ok(alert)
    }

    /// Clears a snooze ahead of its deadline.
    pub fn unsnooze(&self, ctx: &AuthContext, alert_id: AlertId, now: DateTime<Utc>) -> Result<Alert> {
        let current = self.get(ctx, alert_id, ActionKind::Unsnooze)?;
        self.table.authorize(ActionKind::Unsnooze, ctx, Some(&current), now)?;

        let alert = self.alerts.update(ctx.org_id, alert_id, &mut |alert| {
            if !alert.is_open() {
                return Err(StoreError::InvalidTransition {
                    status: alert.status,
                    action: ActionKind::Unsnooze,
                });
            }
            alert.snoozed_until = None;
            Ok(())
        })?;

        self.events.publish(DomainEvent::SnoozeCleared { alert_id });
        Ok(alert)
    }

    /// Administratively hides an alert from the queue.
    pub fn suppress(&self, ctx: &AuthContext, alert_id: AlertId, now: DateTime<Utc>) -> Result<Alert> {
        self.set_suppressed(ctx, alert_id, true, now)
    }

    /// Undoes an administrative hide.
    pub fn unsuppress(&self, ctx: &AuthContext, alert_id: AlertId, now: DateTime<Utc>) -> Result<Alert> {
        self.set_suppressed(ctx, alert_id, false, now)
    }

    fn set_suppressed(
        &self,
        ctx: &AuthContext,
        alert_id: AlertId,
        suppressed: bool,
        now: DateTime<Utc>,
    ) -> Result<Alert> {
        let action = if suppressed { ActionKind::Suppress } else { ActionKind::Unsuppress };
        let current = self.get(ctx, alert_id, action)?;
        self.table.authorize(action, ctx, Some(&current), now)?;

        let alert = self.alerts.update(ctx.org_id, alert_id, &mut |alert| {
            if !alert.is_open() {
                return Err(StoreError::InvalidTransition { status: alert.status, action });
            }
            alert.suppressed = suppressed;
            Ok(())
        })?;

        self.events.publish(if suppressed {
            DomainEvent::Suppressed { alert_id }
        } else {
            DomainEvent::Unsuppressed { alert_id }
        });
        Ok(alert)
    }

    /// Manually raises the escalation level by one, recording the step
    /// in the append-only history.
    pub fn escalate(
        &self,
        ctx: &AuthContext,
        alert_id: AlertId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Alert> {
        let current = self.get(ctx, alert_id, ActionKind::Escalate)?;
        self.table.authorize(ActionKind::Escalate, ctx, Some(&current), now)?;

        let max_level = self.policy.escalation.max_level;
        if current.escalation_level >= max_level {
            return Err(EngineError::validation(format!(
                "alert is already at the maximum escalation level {max_level}"
            )));
        }

        let alert = self.alerts.update(ctx.org_id, alert_id, &mut |alert| {
            if !alert.is_open() {
                return Err(StoreError::InvalidTransition {
                    status: alert.status,
                    action: ActionKind::Escalate,
                });
            }
            alert.escalation_level += 1;
            Ok(())
        })?;

        let from_level = alert.escalation_level - 1;
        self.alerts.append_escalation(EscalationEvent::new(
            alert_id,
            from_level,
            alert.escalation_level,
            Actor::User(ctx.user_id),
            reason,
            now,
        ))?;

        self.events.publish(DomainEvent::Escalated {
            alert_id,
            from_level,
            to_level: alert.escalation_level,
        });
        Ok(alert)
    }

    /// Returns the escalation history, oldest first.
    pub fn escalation_history(
        &self,
        ctx: &AuthContext,
        alert_id: AlertId,
    ) -> Result<Vec<EscalationEvent>> {
        self.alerts
            .escalation_history(ctx.org_id, alert_id)
            .map_err(|err| self.noted(err, ctx, ActionKind::Escalate))
    }

    /// Converts a store error, recording cross-tenant attempts.
    fn noted(&self, err: StoreError, ctx: &AuthContext, action: ActionKind) -> EngineError {
        if let StoreError::OrganizationAccessDenied {
            alert_id,
            caller_org,
            target_org,
        } = &err
        {
            self.audit.log(&AuditEvent::new(AuditKind::CrossTenantDenied {
                user_id: ctx.user_id,
                caller_org: *caller_org,
                target_org: *target_org,
                alert_id: Some(*alert_id),
                action: action.as_str().to_string(),
            }));
        }
        err.into()
    }
}
