//! Bulk actions over many alerts with per-item outcomes.
//!
//! A bulk request authorizes once against the elevated bulk policy,
//! then applies the action to each alert independently: one failure
//! never rolls back or aborts the others. The response reports every
//! item so the caller can retry the failures.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use vigil_audit::{AuditEvent, AuditKind, AuditLogger};
use vigil_core::AlertId;
use vigil_policy::{ActionKind, AuthContext, PolicyTable};

use crate::error::{EngineError, Result};
use crate::lifecycle::Lifecycle;

/// Maximum alerts per bulk request.
pub const MAX_BULK_ITEMS: usize = 100;

/// The action applied to every alert in a bulk request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum BulkAction {
    /// Claim each alert for the caller.
    Claim,
    /// Acknowledge each alert.
    Acknowledge,
    /// Resolve each alert with shared notes.
    Resolve {
        /// Resolution notes applied to every alert.
        notes: String,
    },
    /// Cancel each alert.
    Cancel {
        /// Optional shared reason.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Snooze each alert until the given instant.
    Snooze {
        /// Snooze deadline.
        until: DateTime<Utc>,
    },
}

impl BulkAction {
    /// The policy action this maps to.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Claim => ActionKind::Claim,
            Self::Acknowledge => ActionKind::Acknowledge,
            Self::Resolve { .. } => ActionKind::Resolve,
            Self::Cancel { .. } => ActionKind::Cancel,
            Self::Snooze { .. } => ActionKind::Snooze,
        }
    }
}

/// A bulk request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkRequest {
    /// The action to apply.
    pub action: BulkAction,
    /// The target alerts.
    pub alert_ids: Vec<AlertId>,
}

/// Outcome for one alert in a bulk request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemResult {
    /// The alert.
    pub alert_id: AlertId,
    /// Whether the action applied.
    pub success: bool,
    /// The failure reason when it did not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a whole bulk request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOutcome {
    /// Per-item outcomes, in request order.
    pub results: Vec<BulkItemResult>,
    /// Count of successes.
    pub succeeded: usize,
    /// Count of failures.
    pub failed: usize,
}

/// Applies bulk actions through the lifecycle service.
pub struct BulkProcessor {
    lifecycle: Arc<Lifecycle>,
    table: Arc<PolicyTable>,
    audit: Arc<dyn AuditLogger>,
}

impl BulkProcessor {
    /// Wires the processor to its collaborators.
    #[must_use]
    pub fn new(
        lifecycle: Arc<Lifecycle>,
        table: Arc<PolicyTable>,
        audit: Arc<dyn AuditLogger>,
    ) -> Self {
        Self {
            lifecycle,
            table,
            audit,
        }
    }

    /// Applies a bulk request.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty or oversized request,
    /// or a policy error when the caller is below the bulk role floor.
    /// Per-item failures land in the outcome instead.
    pub fn process(
        &self,
        ctx: &AuthContext,
        request: &BulkRequest,
        now: DateTime<Utc>,
    ) -> Result<BulkOutcome> {
        if request.alert_ids.is_empty() {
            return Err(EngineError::validation("bulk request targets no alerts"));
        }
        if request.alert_ids.len() > MAX_BULK_ITEMS {
            return Err(EngineError::validation(format!(
                "bulk request exceeds the maximum of {MAX_BULK_ITEMS} alerts"
            )));
        }

        let kind = request.action.kind();
        self.table.authorize_bulk(kind, ctx)?;

        let mut results = Vec::with_capacity(request.alert_ids.len());
        let mut succeeded = 0;

        for &alert_id in &request.alert_ids {
            let applied = self.apply(ctx, alert_id, &request.action, now);
            match applied {
                Ok(()) => {
                    succeeded += 1;
                    results.push(BulkItemResult {
                        alert_id,
                        success: true,
                        error: None,
                    });
                }
                Err(err) => {
                    results.push(BulkItemResult {
                        alert_id,
                        success: false,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        let failed = results.len() - succeeded;
        info!(
            action = %kind,
            targeted = request.alert_ids.len(),
            succeeded,
            failed,
            "bulk action applied"
        );
        self.audit.log(&AuditEvent::new(AuditKind::BulkActionApplied {
            user_id: ctx.user_id,
            action: kind,
            targeted: request.alert_ids.len(),
            succeeded,
        }));

        Ok(BulkOutcome {
            results,
            succeeded,
            failed,
        })
    }

    fn apply(
        &self,
        ctx: &AuthContext,
        alert_id: AlertId,
        action: &BulkAction,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match action {
            BulkAction::Claim => self.lifecycle.claim(ctx, alert_id, now).map(drop),
            BulkAction::Acknowledge => self.lifecycle.acknowledge(ctx, alert_id, now).map(drop),
            BulkAction::Resolve { notes } => {
                self.lifecycle.resolve(ctx, alert_id, notes, now).map(drop)
            }
            BulkAction::Cancel { reason } => self
                .lifecycle
                .cancel(ctx, alert_id, reason.as_deref(), now)
                .map(drop),
            BulkAction::Snooze { until } => {
                self.lifecycle.snooze(ctx, alert_id, *until, now).map(drop)
            }
        }
    }
}
