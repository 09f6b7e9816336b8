//! Alert, rule, and observation stores for the Vigil triage engine.
//!
//! The [`AlertRepository`] and [`RuleRepository`] traits are the
//! storage boundary: the engine never talks to a backend directly, so
//! tests and alternative backends inject their own implementations.
//! The in-memory implementations linearize claim acquisition behind a
//! single write lock, giving compare-and-set semantics per alert.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod alerts;
pub mod error;
pub mod filter;
pub mod observations;
pub mod rules;

pub use alerts::{AlertRepository, ForceClaimOutcome, MemoryAlertRepository};
pub use error::{Result, StoreError};
pub use filter::AlertQueryFilter;
pub use observations::{ObservationLog, DEFAULT_SERIES_CAPACITY};
pub use rules::{MemoryRuleRepository, RuleRepository};
