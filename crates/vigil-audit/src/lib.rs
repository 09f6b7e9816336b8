//! Security and workflow audit trail for the Vigil triage engine.
//!
//! Cross-tenant access attempts, claim displacements, and bulk
//! operations leave an append-only audit record. The [`AuditLogger`]
//! trait decouples the engine from the destination; the default
//! implementation ships events through `tracing` as structured JSON.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod events;
pub mod logger;

pub use events::{AuditEvent, AuditKind, AuditSeverity};
pub use logger::{AuditLogger, BoxedAuditLogger, NoopAuditLogger, TracingAuditLogger};
