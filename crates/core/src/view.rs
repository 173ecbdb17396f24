//! Pure derivations over data the server returned. Nothing here performs I/O.

use serde::{Deserialize, Serialize};

use crate::domain::request::{ApprovalRequest, DecisionAction, RequestKind, RequestStatus};
use crate::lifecycle::{Actor, LifecycleEvent, RequestLifecycle};

/// Statuses shown on the dashboard; `CANCELLED` has no card.
pub const DASHBOARD_STATUSES: [RequestStatus; 4] = [
    RequestStatus::Pending,
    RequestStatus::Approved,
    RequestStatus::Rejected,
    RequestStatus::NeedsReview,
];

pub fn count_by_status(requests: &[ApprovalRequest], status: RequestStatus) -> usize {
    requests.iter().filter(|request| request.status == status).count()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub needs_review: usize,
}

impl StatusCounts {
    pub fn from_requests(requests: &[ApprovalRequest]) -> Self {
        Self {
            total: requests.len(),
            pending: count_by_status(requests, RequestStatus::Pending),
            approved: count_by_status(requests, RequestStatus::Approved),
            rejected: count_by_status(requests, RequestStatus::Rejected),
            needs_review: count_by_status(requests, RequestStatus::NeedsReview),
        }
    }
}

/// `round(value / total * 100)`, or 0 for an empty total.
pub fn percentage(value: f64, total: f64) -> u32 {
    if total > 0.0 {
        (value / total * 100.0).round().max(0.0) as u32
    } else {
        0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistributionItem {
    pub label: String,
    pub value: f64,
    pub percentage: u32,
}

/// Each bucket is rounded independently, so the percentages need not sum to 100.
pub fn distribution<I, L>(items: I) -> Vec<DistributionItem>
where
    I: IntoIterator<Item = (L, f64)>,
    L: Into<String>,
{
    let items: Vec<(String, f64)> =
        items.into_iter().map(|(label, value)| (label.into(), value)).collect();
    let total: f64 = items.iter().map(|(_, value)| value).sum();

    items
        .into_iter()
        .map(|(label, value)| DistributionItem {
            percentage: percentage(value, total),
            label,
            value,
        })
        .collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Filter<T> {
    #[default]
    All,
    Only(T),
}

impl<T: PartialEq> Filter<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Self::All => true,
            Self::Only(expected) => expected == value,
        }
    }
}

impl<T> From<Option<T>> for Filter<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::All, Self::Only)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestFilterSet {
    pub status: Filter<RequestStatus>,
    pub kind: Filter<RequestKind>,
}

impl RequestFilterSet {
    pub fn new(status: Filter<RequestStatus>, kind: Filter<RequestKind>) -> Self {
        Self { status, kind }
    }

    pub fn matches(&self, request: &ApprovalRequest) -> bool {
        self.status.matches(&request.status) && self.kind.matches(&request.kind())
    }

    /// Keeps the input order.
    pub fn apply(&self, requests: &[ApprovalRequest]) -> Vec<ApprovalRequest> {
        requests.iter().filter(|request| self.matches(request)).cloned().collect()
    }
}

/// Which controls a viewer gets on the request detail screen.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestControls {
    pub can_edit: bool,
    pub can_delete: bool,
    pub decisions: Vec<DecisionAction>,
    pub can_flag: bool,
}

impl RequestControls {
    pub fn for_viewer(request: &ApprovalRequest, viewer: &Actor) -> Self {
        let lifecycle = RequestLifecycle;
        let decisions = lifecycle
            .permitted_decisions(request.status)
            .iter()
            .copied()
            .filter(|action| lifecycle.allows(request, &LifecycleEvent::decide(*action), viewer))
            .collect();

        Self {
            can_edit: lifecycle.allows(request, &LifecycleEvent::Update, viewer),
            can_delete: lifecycle.allows(request, &LifecycleEvent::Delete, viewer),
            decisions,
            can_flag: lifecycle
                .allows(request, &LifecycleEvent::SetFlag(!request.is_flagged), viewer),
        }
    }

    pub fn offers(&self, action: DecisionAction) -> bool {
        self.decisions.contains(&action)
    }
}

/// `NEEDS_REVIEW` -> `Needs Review`.
pub fn title_case(label: &str) -> String {
    label
        .to_lowercase()
        .replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{
        count_by_status, distribution, percentage, title_case, Filter, RequestControls,
        RequestFilterSet, StatusCounts,
    };
    use crate::domain::request::{
        ApprovalRequest, DecisionAction, ExpenseCategory, ExpenseDetails, RequestDetails,
        RequestId, RequestKind, RequestStatus, Requester,
    };
    use crate::domain::user::{UserId, UserRole};
    use crate::lifecycle::Actor;

    fn request(id: i64, status: RequestStatus) -> ApprovalRequest {
        ApprovalRequest {
            id: RequestId(id),
            requester: Requester { id: UserId(7), username: "ana".to_string() },
            status,
            is_flagged: false,
            decision_reason: None,
            created_at: Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).single().expect("timestamp"),
            details: RequestDetails::Expense(ExpenseDetails {
                amount: Decimal::new(4200, 2),
                category: ExpenseCategory::Food,
                description: None,
            }),
        }
    }

    fn mixed() -> Vec<ApprovalRequest> {
        vec![
            request(1, RequestStatus::Rejected),
            request(2, RequestStatus::Pending),
            request(3, RequestStatus::Rejected),
            request(4, RequestStatus::Pending),
            request(5, RequestStatus::Rejected),
        ]
    }

    #[test]
    fn status_filter_keeps_matching_entries_in_order() {
        let filters = RequestFilterSet::new(Filter::Only(RequestStatus::Rejected), Filter::All);
        let ids: Vec<i64> = filters.apply(&mixed()).iter().map(|request| request.id.0).collect();

        assert_eq!(ids, vec![1, 3, 5]);
    }

    #[test]
    fn filters_are_and_combined_and_idempotent() {
        let filters = RequestFilterSet::new(
            Filter::Only(RequestStatus::Pending),
            Filter::Only(RequestKind::Leave),
        );
        assert!(filters.apply(&mixed()).is_empty());

        let all = RequestFilterSet::default();
        let once = all.apply(&mixed());
        assert_eq!(all.apply(&once), once);
        assert_eq!(once.len(), 5);
    }

    #[test]
    fn counts_cover_dashboard_statuses() {
        let counts = StatusCounts::from_requests(&mixed());
        assert_eq!(counts.total, 5);
        assert_eq!(counts.rejected, 3);
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.approved, 0);
        assert_eq!(count_by_status(&mixed(), RequestStatus::NeedsReview), 0);
    }

    #[test]
    fn three_equal_buckets_render_thirty_three_percent_each() {
        let items = distribution([("PENDING", 1.0), ("APPROVED", 1.0), ("REJECTED", 1.0)]);

        assert!(items.iter().all(|item| item.percentage == 33));
        assert_eq!(items.iter().map(|item| item.percentage).sum::<u32>(), 99);
    }

    #[test]
    fn empty_total_yields_zero_percent() {
        assert_eq!(percentage(5.0, 0.0), 0);
        assert!(distribution([("LEAVE", 0.0)]).iter().all(|item| item.percentage == 0));
        assert_eq!(percentage(2.0, 3.0), 67);
    }

    #[test]
    fn terminal_request_offers_no_decisions() {
        let manager = Actor::new(UserId(1), UserRole::Manager);
        let controls = RequestControls::for_viewer(&request(9, RequestStatus::Approved), &manager);

        assert!(controls.decisions.is_empty());
        assert!(controls.can_flag);
        assert!(!controls.can_delete);
    }

    #[test]
    fn owner_sees_edit_controls_only_while_pending() {
        let owner = Actor::new(UserId(7), UserRole::User);
        let pending = RequestControls::for_viewer(&request(9, RequestStatus::Pending), &owner);
        assert!(pending.can_edit && pending.can_delete);
        assert!(!pending.can_flag);
        assert!(!pending.offers(DecisionAction::Approved));

        let reviewed = RequestControls::for_viewer(&request(9, RequestStatus::NeedsReview), &owner);
        assert!(!reviewed.can_edit && !reviewed.can_delete);
    }

    #[test]
    fn labels_render_in_title_case() {
        assert_eq!(title_case("NEEDS_REVIEW"), "Needs Review");
        assert_eq!(title_case("AUTO_APPROVE"), "Auto Approve");
    }
}
