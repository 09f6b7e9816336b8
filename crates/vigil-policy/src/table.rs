//! The declarative action policy table.
//!
//! One table maps every [`ActionKind`] to its requirement (role floor
//! plus an ownership predicate). Handlers call [`PolicyTable::authorize`]
//! once per request instead of re-implementing role checks.

use chrono::{DateTime, Utc};

use vigil_core::Alert;

use crate::error::{PolicyError, Result};
use crate::types::{ActionKind, AuthContext, Role};

/// How an action relates to the alert's claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipRule {
    /// The claim is irrelevant.
    None,
    /// The caller must hold a live claim on the alert. Coordinators
    /// and admins bypass this.
    RequiresHolder,
    /// If the alert is claimed by someone else, only that holder (or a
    /// coordinator/admin) may act; an unclaimed alert is open to all.
    HolderIfClaimed,
}

/// The requirement attached to one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    /// Minimum role for the action.
    pub min_role: Role,
    /// Claim-ownership predicate.
    pub ownership: OwnershipRule,
}

/// Declarative mapping from action to requirement.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    entries: Vec<(ActionKind, Requirement)>,
    /// Role floor applied on top of per-action floors for destructive
    /// bulk operations.
    bulk_destructive_floor: Role,
}

impl Default for PolicyTable {
    fn default() -> Self {
        use ActionKind as A;
        use OwnershipRule as O;
        use Role as R;

        let req = |min_role, ownership| Requirement { min_role, ownership };

        Self {
            entries: vec![
                (A::Claim, req(R::Clinician, O::None)),
                (A::Unclaim, req(R::Clinician, O::None)),
                (A::ForceClaim, req(R::Coordinator, O::None)),
                (A::Acknowledge, req(R::Clinician, O::RequiresHolder)),
                (A::Resolve, req(R::Clinician, O::HolderIfClaimed)),
                (A::Cancel, req(R::Coordinator, O::None)),
                (A::Snooze, req(R::Clinician, O::HolderIfClaimed)),
                (A::Unsnooze, req(R::Clinician, O::HolderIfClaimed)),
                (A::Suppress, req(R::Admin, O::None)),
                (A::Unsuppress, req(R::Admin, O::None)),
                (A::Escalate, req(R::Clinician, O::None)),
                (A::TriggerEvaluation, req(R::Coordinator, O::None)),
                (A::ManageRules, req(R::Admin, O::None)),
            ],
            bulk_destructive_floor: R::Coordinator,
        }
    }
}

impl PolicyTable {
    /// Creates the default table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the requirement for an action.
    #[must_use]
    pub fn requirement(&self, action: ActionKind) -> Requirement {
        self.entries
            .iter()
            .find(|(a, _)| *a == action)
            .map_or(
                // Unlisted actions default to the strictest floor.
                Requirement {
                    min_role: Role::Admin,
                    ownership: OwnershipRule::None,
                },
                |(_, req)| *req,
            )
    }

    /// Authorizes one action against the caller's context and, when
    /// the action targets an alert, its claim state.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Forbidden`] when the caller's role is
    /// below the floor, or [`PolicyError::NotClaimHolder`] when the
    /// ownership predicate fails.
    pub fn authorize(
        &self,
        action: ActionKind,
        ctx: &AuthContext,
        alert: Option<&Alert>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let req = self.requirement(action);

        if ctx.role < req.min_role {
            return Err(PolicyError::Forbidden {
                action,
                required: req.min_role,
                actual: ctx.role,
            });
        }

        // Coordinators and above bypass ownership predicates.
        if ctx.role >= Role::Coordinator {
            return Ok(());
        }

        match (req.ownership, alert) {
            (OwnershipRule::None, _) | (_, None) => Ok(()),
            (OwnershipRule::RequiresHolder, Some(alert)) => {
                if alert.live_holder(now) == Some(ctx.user_id) {
                    Ok(())
                } else {
                    Err(PolicyError::NotClaimHolder { action })
                }
            }
            (OwnershipRule::HolderIfClaimed, Some(alert)) => match alert.live_holder(now) {
                None => Ok(()),
                Some(holder) if holder == ctx.user_id => Ok(()),
                Some(_) => Err(PolicyError::NotClaimHolder { action }),
            },
        }
    }

    /// Authorizes an action applied in bulk. Destructive bulk actions
    /// carry an elevated role floor regardless of the per-action rule.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Forbidden`] when the caller's role is
    /// below the bulk floor.
    pub fn authorize_bulk(&self, action: ActionKind, ctx: &AuthContext) -> Result<()> {
        let floor = if action.is_destructive() {
            self.bulk_destructive_floor.max(self.requirement(action).min_role)
        } else {
            self.requirement(action).min_role
        };

        if ctx.role < floor {
            return Err(PolicyError::Forbidden {
                action,
                required: floor,
                actual: ctx.role,
            });
        }
        Ok(())
    }
}
