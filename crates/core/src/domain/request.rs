use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub i64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestKind {
    Leave,
    Expense,
    Discount,
}

wire_labels!(RequestKind { Leave => "LEAVE", Expense => "EXPENSE", Discount => "DISCOUNT" });

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    NeedsReview,
    Cancelled,
}

wire_labels!(RequestStatus {
    Pending => "PENDING",
    Approved => "APPROVED",
    Rejected => "REJECTED",
    NeedsReview => "NEEDS_REVIEW",
    Cancelled => "CANCELLED",
});

impl RequestStatus {
    /// No decision may be recorded once a request reaches one of these.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Cancelled)
    }

    pub fn is_actionable(self) -> bool {
        matches!(self, Self::Pending | Self::NeedsReview)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveType {
    Sick,
    Paid,
    Unpaid,
}

wire_labels!(LeaveType { Sick => "SICK", Paid => "PAID", Unpaid => "UNPAID" });

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseCategory {
    Food,
    Travel,
    Accommodation,
    Other,
}

wire_labels!(ExpenseCategory {
    Food => "FOOD",
    Travel => "TRAVEL",
    Accommodation => "ACCOMMODATION",
    Other => "OTHER",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountCategory {
    Loan,
    Festive,
    Other,
}

wire_labels!(DiscountCategory { Loan => "LOAN", Festive => "FESTIVE", Other => "OTHER" });

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveDetails {
    pub leave_type: LeaveType,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseDetails {
    pub amount: Decimal,
    pub category: ExpenseCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountDetails {
    pub discount_percentage: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_category: Option<DiscountCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Per-kind payload. Serializes as the bare detail object; decoding needs the kind, see
/// [`RequestDetails::decode`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RequestDetails {
    Leave(LeaveDetails),
    Expense(ExpenseDetails),
    Discount(DiscountDetails),
}

impl RequestDetails {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Leave(_) => RequestKind::Leave,
            Self::Expense(_) => RequestKind::Expense,
            Self::Discount(_) => RequestKind::Discount,
        }
    }

    pub fn decode(kind: RequestKind, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            RequestKind::Leave => Self::Leave(serde_json::from_value(value)?),
            RequestKind::Expense => Self::Expense(serde_json::from_value(value)?),
            RequestKind::Discount => Self::Discount(serde_json::from_value(value)?),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: UserId,
    pub username: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ApprovalRequestWire", into = "ApprovalRequestWire")]
pub struct ApprovalRequest {
    pub id: RequestId,
    pub requester: Requester,
    pub status: RequestStatus,
    pub is_flagged: bool,
    pub decision_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub details: RequestDetails,
}

impl ApprovalRequest {
    pub fn kind(&self) -> RequestKind {
        self.details.kind()
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.requester.id == user_id
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ApprovalRequestWire {
    id: RequestId,
    user: UserId,
    #[serde(default)]
    username: String,
    request_type: RequestKind,
    status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    decision_reason: Option<String>,
    #[serde(default)]
    is_flagged: bool,
    created_at: DateTime<Utc>,
    details: serde_json::Value,
}

impl TryFrom<ApprovalRequestWire> for ApprovalRequest {
    type Error = String;

    fn try_from(wire: ApprovalRequestWire) -> Result<Self, Self::Error> {
        let details = RequestDetails::decode(wire.request_type, wire.details).map_err(|error| {
            format!("details do not match request_type {}: {error}", wire.request_type)
        })?;

        Ok(Self {
            id: wire.id,
            requester: Requester { id: wire.user, username: wire.username },
            status: wire.status,
            is_flagged: wire.is_flagged,
            decision_reason: wire.decision_reason.filter(|reason| !reason.trim().is_empty()),
            created_at: wire.created_at,
            details,
        })
    }
}

impl From<ApprovalRequest> for ApprovalRequestWire {
    fn from(request: ApprovalRequest) -> Self {
        let request_type = request.kind();
        Self {
            id: request.id,
            user: request.requester.id,
            username: request.requester.username,
            request_type,
            status: request.status,
            decision_reason: request.decision_reason,
            is_flagged: request.is_flagged,
            created_at: request.created_at,
            details: serde_json::to_value(&request.details).unwrap_or(serde_json::Value::Null),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionAction {
    Approved,
    Rejected,
    NeedsReview,
}

wire_labels!(DecisionAction {
    Approved => "APPROVED",
    Rejected => "REJECTED",
    NeedsReview => "NEEDS_REVIEW",
});

impl DecisionAction {
    pub fn resulting_status(self) -> RequestStatus {
        match self {
            Self::Approved => RequestStatus::Approved,
            Self::Rejected => RequestStatus::Rejected,
            Self::NeedsReview => RequestStatus::NeedsReview,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAction {
    pub action: DecisionAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RequestAction {
    pub fn new(action: DecisionAction) -> Self {
        Self { action, reason: None }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        self.reason = (!reason.trim().is_empty()).then_some(reason);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRequest {
    pub is_flagged: bool,
}
