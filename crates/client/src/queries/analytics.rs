use std::sync::Arc;

use approvly_core::domain::analytics::{AnalyticsFilter, AnalyticsSummary};
use approvly_core::errors::ApiError;
use approvly_core::validation::validate_analytics_filter;

use super::{CachedValue, QueryCache, QueryKey, RetryPolicy};
use crate::repositories::AnalyticsRepository;

/// Server-computed summaries, cached per filter.
#[derive(Clone)]
pub struct AnalyticsStore {
    repository: Arc<dyn AnalyticsRepository>,
    cache: Arc<QueryCache>,
    retry: RetryPolicy,
}

impl AnalyticsStore {
    pub fn new(repository: Arc<dyn AnalyticsRepository>, cache: Arc<QueryCache>) -> Self {
        Self { repository, cache, retry: RetryPolicy::default() }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn summary(&self, filter: &AnalyticsFilter) -> Result<AnalyticsSummary, ApiError> {
        validate_analytics_filter(filter)?;
        let key = QueryKey::Analytics(filter.clone());
        if let Some(CachedValue::Analytics(summary)) = self.cache.get(&key).await {
            return Ok(summary);
        }

        let ticket = self.cache.begin_read().await;
        let summary =
            self.retry.run("analytics.summary", || self.repository.summary(filter)).await?;
        self.cache.store(ticket, key, CachedValue::Analytics(summary.clone())).await;
        Ok(summary)
    }
}
