//! Roles, request context, and action kinds.

use serde::{Deserialize, Serialize};

use vigil_core::{OrgId, UserId};

/// The caller's role, ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Works the triage queue.
    Clinician,
    /// Supervises triage; may force-claim and cancel.
    Coordinator,
    /// Organization administration; may suppress and manage rules.
    Admin,
}

impl Role {
    /// Returns the role as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Clinician => "clinician",
            Self::Coordinator => "coordinator",
            Self::Admin => "admin",
        }
    }

    /// Parse a role from its wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "clinician" => Some(Self::Clinician),
            "coordinator" => Some(Self::Coordinator),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Authenticated request context supplied by the identity collaborator.
///
/// The core trusts this context and does not re-authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// The calling user.
    pub user_id: UserId,
    /// The user's organization.
    pub org_id: OrgId,
    /// The user's role.
    pub role: Role,
}

impl AuthContext {
    /// Creates a context.
    #[must_use]
    pub const fn new(user_id: UserId, org_id: OrgId, role: Role) -> Self {
        Self { user_id, org_id, role }
    }
}

/// Every operation the triage engine authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Take the exclusive claim on an alert.
    Claim,
    /// Release one's own claim.
    Unclaim,
    /// Transfer a claim away from its holder.
    ForceClaim,
    /// Acknowledge a pending alert.
    Acknowledge,
    /// Resolve an alert with notes.
    Resolve,
    /// Cancel an alert without resolution.
    Cancel,
    /// Snooze queue visibility.
    Snooze,
    /// Clear a snooze early.
    Unsnooze,
    /// Administratively hide an alert.
    Suppress,
    /// Undo an administrative hide.
    Unsuppress,
    /// Manually raise the escalation level.
    Escalate,
    /// Trigger an evaluator pass by hand.
    TriggerEvaluation,
    /// Create, edit, or retire alert rules.
    ManageRules,
}

impl ActionKind {
    /// Returns the action as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Unclaim => "unclaim",
            Self::ForceClaim => "force-claim",
            Self::Acknowledge => "acknowledge",
            Self::Resolve => "resolve",
            Self::Cancel => "cancel",
            Self::Snooze => "snooze",
            Self::Unsnooze => "unsnooze",
            Self::Suppress => "suppress",
            Self::Unsuppress => "unsuppress",
            Self::Escalate => "escalate",
            Self::TriggerEvaluation => "evaluate",
            Self::ManageRules => "manage-rules",
        }
    }

    /// True for actions that destroy or transfer another user's work
    /// when applied in bulk.
    #[must_use]
    pub const fn is_destructive(&self) -> bool {
        matches!(self, Self::ForceClaim | Self::Resolve | Self::Cancel | Self::Suppress)
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
