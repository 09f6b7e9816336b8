//! Time policies: SLA windows, escalation backoff, claim leases, and
//! snooze bounds.
//!
//! All windows are configuration, never hardcoded into the state
//! machine or the scheduler.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::Severity;

/// Acknowledgement windows per severity, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaPolicy {
    /// Window for CRITICAL alerts.
    pub critical_minutes: i64,
    /// Window for HIGH alerts.
    pub high_minutes: i64,
    /// Window for MEDIUM alerts.
    pub medium_minutes: i64,
    /// Window for LOW alerts.
    pub low_minutes: i64,
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self {
            critical_minutes: 15,
            high_minutes: 60,
            medium_minutes: 240,
            low_minutes: 1440,
        }
    }
}

impl SlaPolicy {
    /// The acknowledgement window for a severity.
    #[must_use]
    pub const fn window(&self, severity: Severity) -> Duration {
        let minutes = match severity {
            Severity::Critical => self.critical_minutes,
            Severity::High => self.high_minutes,
            Severity::Medium => self.medium_minutes,
            Severity::Low => self.low_minutes,
        };
        Duration::minutes(minutes)
    }

    /// The first SLA deadline for an alert created at `created_at`.
    #[must_use]
    pub fn first_deadline(&self, severity: Severity, created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + self.window(severity)
    }
}

/// How successive escalation deadlines stretch out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "scheme")]
pub enum Backoff {
    /// Each level doubles the gap to the next deadline.
    Doubling,
    /// Each level adds a fixed step.
    FixedStep {
        /// The step between deadlines, in minutes.
        step_minutes: i64,
    },
}

/// Escalation behavior for unactioned alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// Deadline stretching scheme.
    pub backoff: Backoff,
    /// The scheduler never escalates past this level.
    pub max_level: u32,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            backoff: Backoff::Doubling,
            max_level: 3,
        }
    }
}

impl EscalationPolicy {
    /// The deadline that must pass before escalating *from* `level`.
    ///
    /// Level 0 uses the first SLA deadline unchanged. With doubling,
    /// the gap after each escalation doubles: the deadline for level n
    /// is `first + window * (2^n - 1)`. With a fixed step it is
    /// `first + step * n`.
    #[must_use]
    pub fn deadline_for_level(
        &self,
        first_deadline: DateTime<Utc>,
        severity_window: Duration,
        level: u32,
    ) -> DateTime<Utc> {
        let extension = match self.backoff {
            Backoff::Doubling => {
                let factor = 2_i64.saturating_pow(level).saturating_sub(1);
                severity_window.num_milliseconds().saturating_mul(factor)
            }
            Backoff::FixedStep { step_minutes } => step_minutes
                .saturating_mul(i64::from(level))
                .saturating_mul(60_000),
        };
        // Extreme configured levels saturate instead of wrapping: a
        // deadline pinned at the far future simply never comes due.
        let extension = Duration::try_milliseconds(extension).unwrap_or(Duration::MAX);
        first_deadline
            .checked_add_signed(extension)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Claim lease behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimPolicy {
    /// Inactivity window before a lease is considered abandoned, in
    /// minutes.
    pub lease_minutes: i64,
}

impl Default for ClaimPolicy {
    fn default() -> Self {
        Self { lease_minutes: 30 }
    }
}

impl ClaimPolicy {
    /// The lease duration.
    #[must_use]
    pub const fn lease_duration(&self) -> Duration {
        Duration::minutes(self.lease_minutes)
    }
}

/// Snooze bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnoozePolicy {
    /// Maximum snooze window, in minutes.
    pub max_minutes: i64,
}

impl Default for SnoozePolicy {
    fn default() -> Self {
        Self { max_minutes: 1440 }
    }
}

impl SnoozePolicy {
    /// Validates a requested snooze deadline against `now`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPolicy`] if `until` is not in the
    /// future or exceeds the maximum window.
    pub fn validate(&self, until: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
        if until <= now {
            return Err(CoreError::InvalidPolicy {
                reason: "snooze deadline must be in the future".to_string(),
            });
        }
        if until - now > Duration::minutes(self.max_minutes) {
            return Err(CoreError::InvalidPolicy {
                reason: format!("snooze window exceeds maximum of {} minutes", self.max_minutes),
            });
        }
        Ok(())
    }
}

/// Aggregate time policy for the triage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TriagePolicy {
    /// SLA acknowledgement windows.
    pub sla: SlaPolicy,
    /// Escalation backoff and cap.
    pub escalation: EscalationPolicy,
    /// Claim lease settings.
    pub claim: ClaimPolicy,
    /// Snooze bounds.
    pub snooze: SnoozePolicy,
}
