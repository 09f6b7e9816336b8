//! Declarative action authorization for the Vigil triage engine.
//!
//! Every operation on an alert is named by an [`ActionKind`] and
//! checked against one [`PolicyTable`] — a declarative mapping from
//! action to role floor and claim-ownership predicate — evaluated once
//! per request. Handlers never carry their own role checks.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use vigil_core::{OrgId, UserId};
//! use vigil_policy::{ActionKind, AuthContext, PolicyTable, Role};
//!
//! let table = PolicyTable::new();
//! let ctx = AuthContext::new(UserId::new(), OrgId::new(), Role::Clinician);
//!
//! // Clinicians may claim, only coordinators may force-claim.
//! assert!(table.authorize(ActionKind::Claim, &ctx, None, Utc::now()).is_ok());
//! assert!(table.authorize(ActionKind::ForceClaim, &ctx, None, Utc::now()).is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod table;
pub mod types;

pub use error::{PolicyError, Result};
pub use table::{OwnershipRule, PolicyTable, Requirement};
pub use types::{ActionKind, AuthContext, Role};
