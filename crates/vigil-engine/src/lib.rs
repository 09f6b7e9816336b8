//! Alert lifecycle and triage engine.
//!
//! Evaluates monitoring rules over incoming observations, coordinates
//! exclusive claims on the resulting alerts, ranks the triage queue,
//! escalates breached SLAs, and applies bulk actions. Everything is
//! scoped to the caller's organization; cross-tenant access is refused
//! and audited.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bulk;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod lifecycle;
pub mod queue;
pub mod scheduler;

pub use bulk::{BulkAction, BulkItemResult, BulkOutcome, BulkProcessor, BulkRequest, MAX_BULK_ITEMS};
pub use engine::{EngineParts, RuleChanges, RuleRemoval, TriageEngine};
pub use error::{EngineError, Result};
pub use evaluator::{EvaluationFailure, EvaluationReport, RuleEvaluator};
pub use events::{DomainEvent, EventBus};
pub use lifecycle::Lifecycle;
pub use queue::{Page, Pagination, QueueEntry, QueuePage, QueueView, TriageQueue};
pub use scheduler::{EscalationScheduler, SweepStats};
