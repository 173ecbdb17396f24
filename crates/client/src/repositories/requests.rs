use async_trait::async_trait;

use approvly_core::domain::request::{
    ApprovalRequest, DiscountDetails, ExpenseDetails, FlagRequest, LeaveDetails, RequestAction,
    RequestDetails, RequestId,
};
use approvly_core::errors::ApiError;

use super::{RequestFilter, RequestRepository};
use crate::transport::ApiClient;

const REQUESTS_PATH: &str = "/api/approval/requests/";

fn request_path(id: RequestId) -> String {
    format!("{REQUESTS_PATH}{id}/")
}

#[derive(Clone, Debug)]
pub struct HttpRequestRepository {
    client: ApiClient,
}

impl HttpRequestRepository {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RequestRepository for HttpRequestRepository {
    async fn list(&self, filter: &RequestFilter) -> Result<Vec<ApprovalRequest>, ApiError> {
        self.client.get(REQUESTS_PATH, &filter.query_pairs()).await
    }

    async fn get(&self, id: RequestId) -> Result<ApprovalRequest, ApiError> {
        self.client.get(&request_path(id), &[]).await
    }

    async fn create_leave(&self, details: &LeaveDetails) -> Result<ApprovalRequest, ApiError> {
        self.client.post("/api/approval/leave/", details).await
    }

    async fn create_expense(
        &self,
        details: &ExpenseDetails,
    ) -> Result<ApprovalRequest, ApiError> {
        self.client.post("/api/approval/expense/", details).await
    }

    async fn create_discount(
        &self,
        details: &DiscountDetails,
    ) -> Result<ApprovalRequest, ApiError> {
        self.client.post("/api/approval/discount/", details).await
    }

    async fn update(
        &self,
        id: RequestId,
        details: &RequestDetails,
    ) -> Result<ApprovalRequest, ApiError> {
        self.client.put(&request_path(id), details).await
    }

    async fn delete(&self, id: RequestId) -> Result<(), ApiError> {
        self.client.delete(&request_path(id)).await
    }

    async fn act(
        &self,
        id: RequestId,
        action: &RequestAction,
    ) -> Result<ApprovalRequest, ApiError> {
        self.client.post(&format!("{REQUESTS_PATH}{id}/action/"), action).await
    }

    async fn flag(&self, id: RequestId, is_flagged: bool) -> Result<ApprovalRequest, ApiError> {
        self.client.post(&format!("{REQUESTS_PATH}{id}/flag/"), &FlagRequest { is_flagged }).await
    }
}
