use async_trait::async_trait;

use approvly_core::domain::analytics::{AnalyticsFilter, AnalyticsSummary};
use approvly_core::errors::ApiError;

use super::AnalyticsRepository;
use crate::transport::ApiClient;

#[derive(Clone, Debug)]
pub struct HttpAnalyticsRepository {
    client: ApiClient,
}

impl HttpAnalyticsRepository {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AnalyticsRepository for HttpAnalyticsRepository {
    async fn summary(&self, filter: &AnalyticsFilter) -> Result<AnalyticsSummary, ApiError> {
        self.client.get("/api/approval/admin/analytics/summary/", &filter.query_pairs()).await
    }
}
