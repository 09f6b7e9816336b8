//! Scheduled sweeps: SLA escalation, snooze expiry, lease expiry.
//!
//! Sweeps are idempotent. Escalation re-derives the due level from the
//! alert's first deadline and current level, so running a sweep twice
//! (or two sweeps racing) never double-escalates. Each sweep honors a
//! wall-clock budget and reports whether it stopped early.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use vigil_core::{Actor, Alert, AlertStatus, EscalationEvent, TriagePolicy};
use vigil_store::AlertRepository;

use crate::events::{DomainEvent, EventBus};

/// What one sweep pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Open alerts examined.
    pub examined: usize,
    /// Escalation steps applied.
    pub escalated: usize,
    /// Lapsed snoozes cleared.
    pub snoozes_cleared: usize,
    /// Abandoned leases reclaimed.
    pub leases_reclaimed: usize,
    /// True when the wall-clock budget ran out before the sweep
    /// finished; the next tick picks up the remainder.
    pub truncated: bool,
}

/// Runs the periodic maintenance sweeps.
pub struct EscalationScheduler {
    alerts: Arc<dyn AlertRepository>,
    policy: TriagePolicy,
    events: EventBus,
}

impl EscalationScheduler {
    /// Wires the scheduler to the alert repository.
    #[must_use]
    pub fn new(alerts: Arc<dyn AlertRepository>, policy: TriagePolicy, events: EventBus) -> Self {
        Self {
            alerts,
            policy,
            events,
        }
    }

    /// Escalates pending alerts whose current deadline has passed.
    ///
    /// An alert several deadlines behind catches up in one pass, one
    /// recorded step per level. Acknowledged, snoozed, suppressed, and
    /// capped alerts are skipped.
    pub fn run_escalation_sweep(
        &self,
        now: DateTime<Utc>,
        budget: Option<std::time::Duration>,
    ) -> SweepStats {
        let started = Instant::now();
        let mut stats = SweepStats::default();

        for alert in self.alerts.open_alerts() {
            if Self::out_of_budget(started, budget) {
                stats.truncated = true;
                break;
            }
            stats.examined += 1;

            if alert.status != AlertStatus::Pending
                || alert.suppressed
                || alert.snoozed_until.is_some_and(|until| until > now)
            {
                continue;
            }

            let due = self.due_level(&alert, now);
            if due <= alert.escalation_level {
                continue;
            }

            let from = alert.escalation_level;
            let updated = self.alerts.update(alert.org_id, alert.id, &mut |candidate| {
                // Re-check under the lock; a racing sweep, a snooze, or
                // a manual escalation may have changed the alert.
                if candidate.status == AlertStatus::Pending
                    && !candidate.suppressed
                    && !candidate.snoozed_until.is_some_and(|until| until > now)
                    && candidate.escalation_level < due
                {
                    candidate.escalation_level = due;
                }
                Ok(())
            });

            let updated = match updated {
                Ok(updated) => updated,
                Err(err) => {
                    warn!(alert_id = %alert.id, error = %err, "escalation update failed");
                    continue;
                }
            };
            if updated.escalation_level <= from {
                continue;
            }

            for level in from..updated.escalation_level {
                let event = EscalationEvent::new(
                    alert.id,
                    level,
                    level + 1,
                    Actor::System,
                    "sla deadline passed without acknowledgement",
                    now,
                );
                if let Err(err) = self.alerts.append_escalation(event) {
                    warn!(alert_id = %alert.id, error = %err, "escalation history append failed");
                    break;
                }
                stats.escalated += 1;
                self.events.publish(DomainEvent::Escalated {
                    alert_id: alert.id,
                    from_level: level,
                    to_level: level + 1,
                });
            }
            info!(
                alert_id = %alert.id,
                from_level = from,
                to_level = updated.escalation_level,
                "alert escalated"
            );
        }

        debug!(
            examined = stats.examined,
            escalated = stats.escalated,
            truncated = stats.truncated,
            "escalation sweep finished"
        );
        stats
    }

    /// Clears snoozes that have lapsed, restoring queue visibility
    /// eagerly instead of waiting for the next read.
    pub fn run_snooze_sweep(
        &self,
        now: DateTime<Utc>,
        budget: Option<std::time::Duration>,
    ) -> SweepStats {
        let started = Instant::now();
        let mut stats = SweepStats::default();

        for alert in self.alerts.open_alerts() {
            if Self::out_of_budget(started, budget) {
                stats.truncated = true;
                break;
            }
            stats.examined += 1;

            let lapsed = alert.snoozed_until.is_some_and(|until| until <= now);
            if !lapsed {
                continue;
            }

            let cleared = self.alerts.update(alert.org_id, alert.id, &mut |candidate| {
                if candidate.snoozed_until.is_some_and(|until| until <= now) {
                    candidate.snoozed_until = None;
                }
                Ok(())
            });
            match cleared {
                Ok(_) => {
                    stats.snoozes_cleared += 1;
                    self.events.publish(DomainEvent::SnoozeCleared { alert_id: alert.id });
                }
                Err(err) => {
                    warn!(alert_id = %alert.id, error = %err, "snooze clear failed");
                }
            }
        }

        stats
    }

    /// Clears expired claim leases so the queue shows the alerts as
    /// unclaimed again. Lazy reclaim at claim time keeps correctness;
    /// the sweep keeps reads tidy and emits the event.
    pub fn run_lease_sweep(
        &self,
        now: DateTime<Utc>,
        budget: Option<std::time::Duration>,
    ) -> SweepStats {
        let started = Instant::now();
        let mut stats = SweepStats::default();

        for alert in self.alerts.open_alerts() {
            if Self::out_of_budget(started, budget) {
                stats.truncated = true;
                break;
            }
            stats.examined += 1;

            let Some(lease) = alert.claim else { continue };
            if !lease.is_expired(now) {
                continue;
            }

            let cleared = self.alerts.update(alert.org_id, alert.id, &mut |candidate| {
                if candidate.claim.is_some_and(|l| l.is_expired(now)) {
                    candidate.claim = None;
                }
                Ok(())
            });
            match cleared {
                Ok(_) => {
                    stats.leases_reclaimed += 1;
                    self.events.publish(DomainEvent::LeaseReclaimed {
                        alert_id: alert.id,
                        holder: lease.holder,
                    });
                }
                Err(err) => {
                    warn!(alert_id = %alert.id, error = %err, "lease reclaim failed");
                }
            }
        }

        stats
    }

    /// The escalation level the alert should be at now, capped by
    /// policy.
    fn due_level(&self, alert: &Alert, now: DateTime<Utc>) -> u32 {
        let window = self.policy.sla.window(alert.severity);
        let mut level = alert.escalation_level;
        while level < self.policy.escalation.max_level {
            let deadline =
                self.policy
                    .escalation
                    .deadline_for_level(alert.first_sla_deadline, window, level);
            if now < deadline {
                break;
            }
            level += 1;
        }
        level
    }

    fn out_of_budget(started: Instant, budget: Option<std::time::Duration>) -> bool {
        budget.is_some_and(|b| started.elapsed() >= b)
    }
}
