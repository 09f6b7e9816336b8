//! Domain events published on every state change.
//!
//! Downstream collaborators (notification fan-out, dashboards)
//! subscribe through the [`EventBus`]; publishing never blocks and a
//! bus with no subscribers drops events silently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use vigil_core::{AlertId, OrgId, Severity, UserId};

/// Default capacity of the broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// A state change in the triage engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum DomainEvent {
    /// A new alert entered the queue.
    AlertCreated {
        /// The alert.
        alert_id: AlertId,
        /// The owning organization.
        org_id: OrgId,
        /// Captured severity.
        severity: Severity,
    },
    /// An open alert absorbed a repeat breach.
    AlertRefreshed {
        /// The alert.
        alert_id: AlertId,
    },
    /// A user took the claim.
    Claimed {
        /// The alert.
        alert_id: AlertId,
        /// The new holder.
        user_id: UserId,
    },
    /// The holder released the claim.
    Unclaimed {
        /// The alert.
        alert_id: AlertId,
    },
    /// A supervisor transferred the claim.
    ClaimTransferred {
        /// The alert.
        alert_id: AlertId,
        /// The displaced holder, if the alert was claimed.
        from: Option<UserId>,
        /// The new holder.
        to: UserId,
    },
    /// An abandoned lease was cleared by the sweep.
    LeaseReclaimed {
        /// The alert.
        alert_id: AlertId,
        /// The holder whose lease lapsed.
        holder: UserId,
    },
    /// The alert was acknowledged.
    Acknowledged {
        /// The alert.
        alert_id: AlertId,
        /// Who acknowledged it.
        user_id: UserId,
    },
    /// The alert was resolved with notes.
    Resolved {
        /// The alert.
        alert_id: AlertId,
        /// Who resolved it.
        user_id: UserId,
    },
    /// The alert was cancelled.
    Cancelled {
        /// The alert.
        alert_id: AlertId,
        /// Who cancelled it.
        user_id: UserId,
    },
    /// Queue visibility was suspended.
    Snoozed {
        /// The alert.
        alert_id: AlertId,
        /// Until when.
        until: DateTime<Utc>,
    },
    /// A snooze ended, by hand or by the sweep.
    SnoozeCleared {
        /// The alert.
        alert_id: AlertId,
    },
    /// The alert was administratively hidden.
    Suppressed {
        /// The alert.
        alert_id: AlertId,
    },
    /// An administrative hide was undone.
    Unsuppressed {
        /// The alert.
        alert_id: AlertId,
    },
    /// The escalation level rose.
    Escalated {
        /// The alert.
        alert_id: AlertId,
        /// Level before.
        from_level: u32,
        /// Level after.
        to_level: u32,
    },
}

/// Broadcast channel for [`DomainEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    /// Creates a bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event. Dropped silently when nobody listens.
    pub fn publish(&self, event: DomainEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribes to future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let alert_id = AlertId::new();
        bus.publish(DomainEvent::Unclaimed { alert_id });

        let event = rx.recv().await.unwrap();
        assert_eq!(event, DomainEvent::Unclaimed { alert_id });
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::default();
        bus.publish(DomainEvent::Unclaimed { alert_id: AlertId::new() });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = DomainEvent::Escalated {
            alert_id: AlertId::new(),
            from_level: 0,
            to_level: 1,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"escalated\""));
    }
}
