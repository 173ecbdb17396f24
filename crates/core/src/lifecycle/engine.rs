use thiserror::Error;

use crate::domain::request::{ApprovalRequest, DecisionAction, RequestId, RequestStatus};
use crate::domain::user::UserRole;
use crate::lifecycle::states::{Actor, Disposition, LifecycleEvent, TransitionOutcome};

const ALL_DECISIONS: &[DecisionAction] =
    &[DecisionAction::Approved, DecisionAction::Rejected, DecisionAction::NeedsReview];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("role {role:?} may not {event} requests")]
    NotAuthorized { role: UserRole, event: &'static str },
    #[error("request {request_id} belongs to another user")]
    NotOwner { request_id: RequestId },
    #[error("request in status {from} cannot {event}")]
    InvalidTransition { from: RequestStatus, event: &'static str },
    #[error("request in status {status} can no longer be edited")]
    NotEditable { status: RequestStatus },
}

/// Transition rules for an approval request. The server remains the arbiter; the client uses
/// the same rules to decide which controls to offer.
#[derive(Clone, Debug, Default)]
pub struct RequestLifecycle;

impl RequestLifecycle {
    pub fn initial_status(&self) -> RequestStatus {
        RequestStatus::Pending
    }

    pub fn permitted_decisions(&self, status: RequestStatus) -> &'static [DecisionAction] {
        if status.is_actionable() {
            ALL_DECISIONS
        } else {
            &[]
        }
    }

    pub fn apply(
        &self,
        request: &ApprovalRequest,
        event: &LifecycleEvent,
        actor: &Actor,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let from = request.status;
        let to = match event {
            LifecycleEvent::Decide(action) => {
                require_decision_role(actor, event)?;
                if !self.permitted_decisions(from).contains(&action.action) {
                    return Err(LifecycleError::InvalidTransition { from, event: event.name() });
                }
                Disposition::Status(action.action.resulting_status())
            }
            LifecycleEvent::SetFlag(_) => {
                require_decision_role(actor, event)?;
                Disposition::Status(from)
            }
            LifecycleEvent::Update => {
                require_owner_while_pending(request, actor)?;
                Disposition::Status(from)
            }
            LifecycleEvent::Delete => {
                require_owner_while_pending(request, actor)?;
                Disposition::Deleted
            }
        };

        Ok(TransitionOutcome { from, to, event: event.clone() })
    }

    pub fn allows(&self, request: &ApprovalRequest, event: &LifecycleEvent, actor: &Actor) -> bool {
        self.apply(request, event, actor).is_ok()
    }
}

fn require_decision_role(actor: &Actor, event: &LifecycleEvent) -> Result<(), LifecycleError> {
    if actor.role.can_decide() {
        Ok(())
    } else {
        Err(LifecycleError::NotAuthorized { role: actor.role, event: event.name() })
    }
}

fn require_owner_while_pending(
    request: &ApprovalRequest,
    actor: &Actor,
) -> Result<(), LifecycleError> {
    if !request.is_owned_by(actor.user_id) {
        return Err(LifecycleError::NotOwner { request_id: request.id });
    }
    if request.status != RequestStatus::Pending {
        return Err(LifecycleError::NotEditable { status: request.status });
    }
    Ok(())
}

impl ApprovalRequest {
    /// Applies an accepted transition. Returns `None` when the request was deleted.
    pub fn apply_outcome(mut self, outcome: &TransitionOutcome) -> Option<Self> {
        let Disposition::Status(status) = outcome.to else {
            return None;
        };

        match &outcome.event {
            LifecycleEvent::Decide(action) => {
                self.status = status;
                self.decision_reason = action.reason.clone();
            }
            LifecycleEvent::SetFlag(flagged) => self.is_flagged = *flagged,
            LifecycleEvent::Update | LifecycleEvent::Delete => {}
        }
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use crate::domain::request::{
        ApprovalRequest, DecisionAction, LeaveDetails, LeaveType, RequestAction, RequestDetails,
        RequestId, RequestStatus, Requester,
    };
    use crate::domain::user::{UserId, UserRole};
    use crate::lifecycle::engine::{LifecycleError, RequestLifecycle};
    use crate::lifecycle::states::{Actor, Disposition, LifecycleEvent};

    const OWNER: UserId = UserId(7);

    fn request(status: RequestStatus) -> ApprovalRequest {
        ApprovalRequest {
            id: RequestId(42),
            requester: Requester { id: OWNER, username: "ana".to_string() },
            status,
            is_flagged: false,
            decision_reason: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 3, 8, 0, 0).single().expect("timestamp"),
            details: RequestDetails::Leave(LeaveDetails {
                leave_type: LeaveType::Sick,
                from_date: NaiveDate::from_ymd_opt(2024, 1, 10).expect("date"),
                to_date: NaiveDate::from_ymd_opt(2024, 1, 11).expect("date"),
                reason: "flu".to_string(),
            }),
        }
    }

    fn manager() -> Actor {
        Actor::new(UserId(1), UserRole::Manager)
    }

    fn owner() -> Actor {
        Actor::new(OWNER, UserRole::User)
    }

    #[test]
    fn pending_request_accepts_every_decision() {
        let lifecycle = RequestLifecycle;
        let pending = request(RequestStatus::Pending);
        for action in DecisionAction::ALL.iter().copied() {
            let outcome = lifecycle
                .apply(&pending, &LifecycleEvent::decide(action), &manager())
                .expect("pending request is actionable");
            assert_eq!(outcome.to, Disposition::Status(action.resulting_status()));
        }
    }

    #[test]
    fn needs_review_can_be_decided_again() {
        let outcome = RequestLifecycle
            .apply(
                &request(RequestStatus::NeedsReview),
                &LifecycleEvent::decide(DecisionAction::NeedsReview),
                &manager(),
            )
            .expect("re-decision while under review");
        assert_eq!(outcome.from, RequestStatus::NeedsReview);
        assert_eq!(outcome.to, Disposition::Status(RequestStatus::NeedsReview));
    }

    #[test]
    fn terminal_statuses_reject_decisions() {
        for status in [RequestStatus::Approved, RequestStatus::Rejected, RequestStatus::Cancelled] {
            let approve = LifecycleEvent::decide(DecisionAction::Approved);
            let error = RequestLifecycle
                .apply(&request(status), &approve, &manager())
                .expect_err("terminal request must not transition");
            assert_eq!(error, LifecycleError::InvalidTransition { from: status, event: "approve" });
            assert!(RequestLifecycle.permitted_decisions(status).is_empty());
        }
    }

    #[test]
    fn plain_users_cannot_decide_or_flag() {
        let pending = request(RequestStatus::Pending);
        let decide = LifecycleEvent::decide(DecisionAction::Approved);
        assert!(matches!(
            RequestLifecycle.apply(&pending, &decide, &owner()),
            Err(LifecycleError::NotAuthorized { role: UserRole::User, .. })
        ));
        assert!(!RequestLifecycle.allows(&pending, &LifecycleEvent::SetFlag(true), &owner()));
    }

    #[test]
    fn flag_is_valid_in_any_status_and_keeps_status() {
        for status in RequestStatus::ALL.iter().copied() {
            let outcome = RequestLifecycle
                .apply(&request(status), &LifecycleEvent::SetFlag(true), &manager())
                .expect("flag is orthogonal to status");
            let flagged = request(status).apply_outcome(&outcome).expect("still present");
            assert!(flagged.is_flagged);
            assert_eq!(flagged.status, status);
        }
    }

    #[test]
    fn only_owner_may_delete_while_pending() {
        let lifecycle = RequestLifecycle;
        let deleted = lifecycle
            .apply(&request(RequestStatus::Pending), &LifecycleEvent::Delete, &owner())
            .expect("owner deletes pending request");
        assert_eq!(deleted.to, Disposition::Deleted);
        assert!(request(RequestStatus::Pending).apply_outcome(&deleted).is_none());

        assert_eq!(
            lifecycle.apply(&request(RequestStatus::Pending), &LifecycleEvent::Delete, &manager()),
            Err(LifecycleError::NotOwner { request_id: RequestId(42) })
        );
        assert_eq!(
            lifecycle.apply(&request(RequestStatus::Approved), &LifecycleEvent::Update, &owner()),
            Err(LifecycleError::NotEditable { status: RequestStatus::Approved })
        );
    }

    #[test]
    fn decision_reason_is_recorded_with_the_decision() {
        let event = LifecycleEvent::Decide(
            RequestAction::new(DecisionAction::Rejected).with_reason("over budget"),
        );
        let outcome = RequestLifecycle
            .apply(&request(RequestStatus::Pending), &event, &manager())
            .expect("reject pending");
        let rejected = request(RequestStatus::Pending).apply_outcome(&outcome).expect("present");

        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(rejected.decision_reason.as_deref(), Some("over budget"));
    }
}
