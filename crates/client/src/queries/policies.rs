use std::sync::Arc;

use tracing::info;

use approvly_core::domain::policy::{Policy, PolicyDraft, PolicyId};
use approvly_core::errors::ApiError;
use approvly_core::validation::validate_policy;

use super::{CachedValue, QueryCache, QueryKey, RetryPolicy};
use crate::repositories::PolicyRepository;

#[derive(Clone)]
pub struct PolicyStore {
    repository: Arc<dyn PolicyRepository>,
    cache: Arc<QueryCache>,
    retry: RetryPolicy,
}

impl PolicyStore {
    pub fn new(repository: Arc<dyn PolicyRepository>, cache: Arc<QueryCache>) -> Self {
        Self { repository, cache, retry: RetryPolicy::default() }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn list(&self) -> Result<Vec<Policy>, ApiError> {
        if let Some(CachedValue::Policies(policies)) = self.cache.get(&QueryKey::Policies).await {
            return Ok(policies);
        }

        let ticket = self.cache.begin_read().await;
        let policies = self.retry.run("policies.list", || self.repository.list()).await?;
        self.cache.store(ticket, QueryKey::Policies, CachedValue::Policies(policies.clone())).await;
        Ok(policies)
    }

    pub async fn get(&self, id: PolicyId) -> Result<Policy, ApiError> {
        let key = QueryKey::Policy(id);
        if let Some(CachedValue::Policy(policy)) = self.cache.get(&key).await {
            return Ok(policy);
        }

        let ticket = self.cache.begin_read().await;
        let policy = self.retry.run("policies.get", || self.repository.get(id)).await?;
        self.cache.store(ticket, key, CachedValue::Policy(policy.clone())).await;
        Ok(policy)
    }

    pub async fn create(&self, draft: &PolicyDraft) -> Result<Policy, ApiError> {
        validate_policy(draft)?;
        let created = self.repository.create(draft).await?;
        self.cache.invalidate(&QueryKey::Policies).await;
        info!(
            event_name = "client.policy.created",
            policy_key = %created.policy_key,
            request_type = created.request_type.as_str(),
            "policy created"
        );
        Ok(created)
    }

    pub async fn update(&self, id: PolicyId, draft: &PolicyDraft) -> Result<Policy, ApiError> {
        validate_policy(draft)?;
        let updated = self.repository.update(id, draft).await?;
        self.invalidate(id).await;
        Ok(updated)
    }

    pub async fn delete(&self, id: PolicyId) -> Result<(), ApiError> {
        self.repository.delete(id).await?;
        self.invalidate(id).await;
        info!(event_name = "client.policy.deleted", policy_id = id.0, "policy deleted");
        Ok(())
    }

    async fn invalidate(&self, id: PolicyId) {
        let key = QueryKey::Policy(id);
        self.cache
            .invalidate_where(|candidate| *candidate == QueryKey::Policies || *candidate == key)
            .await;
    }
}
