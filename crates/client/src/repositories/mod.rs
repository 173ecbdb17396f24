use async_trait::async_trait;

use approvly_core::domain::analytics::{AnalyticsFilter, AnalyticsSummary};
use approvly_core::domain::policy::{Policy, PolicyDraft, PolicyId};
use approvly_core::domain::request::{
    ApprovalRequest, DiscountDetails, ExpenseDetails, LeaveDetails, RequestAction, RequestDetails,
    RequestId, RequestStatus,
};
use approvly_core::errors::ApiError;

pub mod analytics;
pub mod auth;
pub mod memory;
pub mod policies;
pub mod requests;

pub use analytics::HttpAnalyticsRepository;
pub use auth::AuthService;
pub use memory::{CallCounts, InMemoryApprovalService};
pub use policies::HttpPolicyRepository;
pub use requests::HttpRequestRepository;

/// Server-side list filter. `mine` restricts to the viewer's own requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RequestFilter {
    pub mine: Option<bool>,
    pub status: Option<RequestStatus>,
}

impl RequestFilter {
    pub fn mine() -> Self {
        Self { mine: Some(true), status: None }
    }

    pub fn with_status(mut self, status: RequestStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(mine) = self.mine {
            pairs.push(("mine", mine.to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        pairs
    }
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    /// Server order is kept; nothing is re-sorted client-side.
    async fn list(&self, filter: &RequestFilter) -> Result<Vec<ApprovalRequest>, ApiError>;
    async fn get(&self, id: RequestId) -> Result<ApprovalRequest, ApiError>;
    async fn create_leave(&self, details: &LeaveDetails) -> Result<ApprovalRequest, ApiError>;
    async fn create_expense(&self, details: &ExpenseDetails)
        -> Result<ApprovalRequest, ApiError>;
    async fn create_discount(
        &self,
        details: &DiscountDetails,
    ) -> Result<ApprovalRequest, ApiError>;

    async fn create(&self, details: &RequestDetails) -> Result<ApprovalRequest, ApiError> {
        match details {
            RequestDetails::Leave(leave) => self.create_leave(leave).await,
            RequestDetails::Expense(expense) => self.create_expense(expense).await,
            RequestDetails::Discount(discount) => self.create_discount(discount).await,
        }
    }

    async fn update(
        &self,
        id: RequestId,
        details: &RequestDetails,
    ) -> Result<ApprovalRequest, ApiError>;
    async fn delete(&self, id: RequestId) -> Result<(), ApiError>;
    async fn act(&self, id: RequestId, action: &RequestAction)
        -> Result<ApprovalRequest, ApiError>;
    async fn flag(&self, id: RequestId, is_flagged: bool) -> Result<ApprovalRequest, ApiError>;
}

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Policy>, ApiError>;
    async fn get(&self, id: PolicyId) -> Result<Policy, ApiError>;
    async fn create(&self, draft: &PolicyDraft) -> Result<Policy, ApiError>;
    async fn update(&self, id: PolicyId, draft: &PolicyDraft) -> Result<Policy, ApiError>;
    async fn delete(&self, id: PolicyId) -> Result<(), ApiError>;
}

#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    async fn summary(&self, filter: &AnalyticsFilter) -> Result<AnalyticsSummary, ApiError>;
}
