use async_trait::async_trait;

use approvly_core::domain::policy::{Policy, PolicyDraft, PolicyId};
use approvly_core::errors::ApiError;

use super::PolicyRepository;
use crate::transport::ApiClient;

const POLICIES_PATH: &str = "/api/approval/policies/";

#[derive(Clone, Debug)]
pub struct HttpPolicyRepository {
    client: ApiClient,
}

impl HttpPolicyRepository {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PolicyRepository for HttpPolicyRepository {
    async fn list(&self) -> Result<Vec<Policy>, ApiError> {
        self.client.get(POLICIES_PATH, &[]).await
    }

    async fn get(&self, id: PolicyId) -> Result<Policy, ApiError> {
        self.client.get(&format!("{POLICIES_PATH}{id}/"), &[]).await
    }

    async fn create(&self, draft: &PolicyDraft) -> Result<Policy, ApiError> {
        self.client.post(POLICIES_PATH, draft).await
    }

    async fn update(&self, id: PolicyId, draft: &PolicyDraft) -> Result<Policy, ApiError> {
        self.client.put(&format!("{POLICIES_PATH}{id}/"), draft).await
    }

    async fn delete(&self, id: PolicyId) -> Result<(), ApiError> {
        self.client.delete(&format!("{POLICIES_PATH}{id}/")).await
    }
}
