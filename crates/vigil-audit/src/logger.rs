//! Audit logging backends.

use crate::events::{AuditEvent, AuditSeverity};

/// Trait for audit logging backends.
///
/// Implement this trait to ship audit events to a different
/// destination (database, external SIEM).
pub trait AuditLogger: Send + Sync {
    /// Logs an audit event.
    fn log(&self, event: &AuditEvent);

    /// Logs an audit event if the severity is at or above the minimum.
    fn log_if_severe(&self, event: &AuditEvent, min_severity: AuditSeverity) {
        if event.severity() >= min_severity {
            self.log(event);
        }
    }
}

/// Audit logger backed by the `tracing` infrastructure.
///
/// Events map to tracing levels by severity:
/// - Info → `tracing::info!`
/// - Medium → `tracing::warn!`
/// - Critical → `tracing::error!`
#[derive(Debug, Clone, Default)]
pub struct TracingAuditLogger;

impl TracingAuditLogger {
    /// Creates a new tracing-based audit logger.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl AuditLogger for TracingAuditLogger {
    fn log(&self, event: &AuditEvent) {
        let event_id = event.event_id;
        let event_type = event.event_type();
        let severity = event.severity();
        let json = event.to_json().unwrap_or_else(|_| "{}".to_string());

        match severity {
            AuditSeverity::Info => {
                tracing::info!(
                    target: "vigil_audit",
                    %event_id,
                    %event_type,
                    %severity,
                    event_json = %json,
                    "[AUDIT] {event_type}"
                );
            }
            AuditSeverity::Medium => {
                tracing::warn!(
                    target: "vigil_audit",
                    %event_id,
                    %event_type,
                    %severity,
                    event_json = %json,
                    "[AUDIT] {event_type}"
                );
            }
            AuditSeverity::Critical => {
                tracing::error!(
                    target: "vigil_audit",
                    %event_id,
                    %event_type,
                    %severity,
                    event_json = %json,
                    "[AUDIT] {event_type}"
                );
            }
        }
    }
}

/// A no-op audit logger for tests or disabled scenarios.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditLogger;

impl NoopAuditLogger {
    /// Creates a new no-op audit logger.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl AuditLogger for NoopAuditLogger {
    fn log(&self, _event: &AuditEvent) {
        // Intentionally does nothing
    }
}

/// A boxed audit logger for dynamic dispatch.
pub type BoxedAuditLogger = Box<dyn AuditLogger>;

impl AuditLogger for BoxedAuditLogger {
    fn log(&self, event: &AuditEvent) {
        (**self).log(event);
    }
}
