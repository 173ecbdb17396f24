use serde::{Deserialize, Serialize};

use crate::domain::request::{DecisionAction, RequestAction, RequestStatus};
use crate::domain::user::{User, UserId, UserRole};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: UserRole,
}

impl Actor {
    pub fn new(user_id: UserId, role: UserRole) -> Self {
        Self { user_id, role }
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self { user_id: user.id, role: user.role }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Decide(RequestAction),
    SetFlag(bool),
    Update,
    Delete,
}

impl LifecycleEvent {
    pub fn decide(action: DecisionAction) -> Self {
        Self::Decide(RequestAction::new(action))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Decide(action) => match action.action {
                DecisionAction::Approved => "approve",
                DecisionAction::Rejected => "reject",
                DecisionAction::NeedsReview => "needs_review",
            },
            Self::SetFlag(true) => "flag",
            Self::SetFlag(false) => "unflag",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Where a request ends up after a transition. Deletion removes the entity rather than
/// assigning it a status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    Status(RequestStatus),
    Deleted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: RequestStatus,
    pub to: Disposition,
    pub event: LifecycleEvent,
}
