use std::sync::Arc;

use tracing::info;

use approvly_core::domain::request::{ApprovalRequest, RequestAction, RequestDetails, RequestId};
use approvly_core::errors::ApiError;
use approvly_core::validation::validate_details;

use super::{CachedValue, QueryCache, QueryKey, RetryPolicy};
use crate::repositories::{RequestFilter, RequestRepository};

/// Cached access to approval requests.
///
/// Every mutation invalidates all request lists and analytics summaries. Delete also drops the
/// request itself; update, act and flag replace it with the server's entity.
#[derive(Clone)]
pub struct RequestStore {
    repository: Arc<dyn RequestRepository>,
    cache: Arc<QueryCache>,
    retry: RetryPolicy,
}

impl RequestStore {
    pub fn new(repository: Arc<dyn RequestRepository>, cache: Arc<QueryCache>) -> Self {
        Self { repository, cache, retry: RetryPolicy::default() }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub async fn list(&self, filter: &RequestFilter) -> Result<Vec<ApprovalRequest>, ApiError> {
        let key = QueryKey::Requests(*filter);
        if let Some(CachedValue::Requests(requests)) = self.cache.get(&key).await {
            return Ok(requests);
        }

        let ticket = self.cache.begin_read().await;
        let requests = self.retry.run("requests.list", || self.repository.list(filter)).await?;
        self.cache.store(ticket, key, CachedValue::Requests(requests.clone())).await;
        Ok(requests)
    }

    pub async fn get(&self, id: RequestId) -> Result<ApprovalRequest, ApiError> {
        let key = QueryKey::Request(id);
        if let Some(CachedValue::Request(request)) = self.cache.get(&key).await {
            return Ok(request);
        }

        let ticket = self.cache.begin_read().await;
        let request = self.retry.run("requests.get", || self.repository.get(id)).await?;
        self.cache.store(ticket, key, CachedValue::Request(request.clone())).await;
        Ok(request)
    }

    /// Dispatches on the details variant. Invalid payloads never reach the repository.
    pub async fn create(&self, details: &RequestDetails) -> Result<ApprovalRequest, ApiError> {
        validate_details(details)?;
        let created = self.repository.create(details).await?;
        self.cache
            .invalidate_where(|candidate| candidate.is_request_list() || candidate.is_analytics())
            .await;
        info!(
            event_name = "client.request.created",
            request_id = created.id.0,
            request_type = created.kind().as_str(),
            "approval request created"
        );
        Ok(created)
    }

    pub async fn update(
        &self,
        id: RequestId,
        details: &RequestDetails,
    ) -> Result<ApprovalRequest, ApiError> {
        validate_details(details)?;
        let updated = self.repository.update(id, details).await?;
        self.settle(id, &updated).await;
        Ok(updated)
    }

    pub async fn delete(&self, id: RequestId) -> Result<(), ApiError> {
        self.repository.delete(id).await?;
        self.cache.invalidate_where(|candidate| candidate.is_affected_by_request(id)).await;
        info!(event_name = "client.request.deleted", request_id = id.0, "approval request deleted");
        Ok(())
    }

    pub async fn act(
        &self,
        id: RequestId,
        action: &RequestAction,
    ) -> Result<ApprovalRequest, ApiError> {
        let decided = self.repository.act(id, action).await?;
        self.settle(id, &decided).await;
        info!(
            event_name = "client.request.decided",
            request_id = id.0,
            action = action.action.as_str(),
            status = decided.status.as_str(),
            "approval request decided"
        );
        Ok(decided)
    }

    pub async fn flag(&self, id: RequestId, is_flagged: bool) -> Result<ApprovalRequest, ApiError> {
        let flagged = self.repository.flag(id, is_flagged).await?;
        self.settle(id, &flagged).await;
        Ok(flagged)
    }

    async fn settle(&self, id: RequestId, entity: &ApprovalRequest) {
        self.cache.invalidate_where(|candidate| candidate.is_affected_by_request(id)).await;
        self.cache.prime(QueryKey::Request(id), CachedValue::Request(entity.clone())).await;
    }
}
