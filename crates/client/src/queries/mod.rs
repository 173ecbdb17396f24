//! Read-through cache over the repositories, with the invalidation rules every mutation
//! follows before it reports success.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use approvly_core::domain::analytics::{AnalyticsFilter, AnalyticsSummary};
use approvly_core::domain::policy::{Policy, PolicyId};
use approvly_core::domain::request::{ApprovalRequest, RequestId};
use approvly_core::errors::ApiError;

use crate::repositories::RequestFilter;

pub mod analytics;
pub mod policies;
pub mod requests;

pub use analytics::AnalyticsStore;
pub use policies::PolicyStore;
pub use requests::RequestStore;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Requests(RequestFilter),
    Request(RequestId),
    Policies,
    Policy(PolicyId),
    Analytics(AnalyticsFilter),
}

impl QueryKey {
    pub fn is_request_list(&self) -> bool {
        matches!(self, Self::Requests(_))
    }

    /// Summaries are aggregated over requests, so every request mutation stales them.
    pub fn is_analytics(&self) -> bool {
        matches!(self, Self::Analytics(_))
    }

    /// Keys a mutation of request `id` invalidates: every list, every summary and the request.
    pub fn is_affected_by_request(&self, id: RequestId) -> bool {
        self.is_request_list() || self.is_analytics() || *self == Self::Request(id)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Requests(_) => "requests",
            Self::Request(_) => "request",
            Self::Policies => "policies",
            Self::Policy(_) => "policy",
            Self::Analytics(_) => "analytics",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CachedValue {
    Requests(Vec<ApprovalRequest>),
    Request(ApprovalRequest),
    Policies(Vec<Policy>),
    Policy(Policy),
    Analytics(AnalyticsSummary),
}

/// Snapshot of the cache generation taken when a read starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadTicket {
    generation: u64,
}

#[derive(Default)]
struct CacheState {
    generation: u64,
    entries: HashMap<QueryKey, CachedValue>,
}

#[derive(Default)]
pub struct QueryCache {
    state: RwLock<CacheState>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &QueryKey) -> Option<CachedValue> {
        self.state.read().await.entries.get(key).cloned()
    }

    pub async fn contains(&self, key: &QueryKey) -> bool {
        self.state.read().await.entries.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn begin_read(&self) -> ReadTicket {
        ReadTicket { generation: self.state.read().await.generation }
    }

    /// Stores a read result unless an invalidation happened since `ticket` was taken.
    pub async fn store(&self, ticket: ReadTicket, key: QueryKey, value: CachedValue) -> bool {
        let mut state = self.state.write().await;
        if state.generation != ticket.generation {
            debug!(
                event_name = "client.cache.stale_read_dropped",
                key = key.label(),
                "read finished after an invalidation; result not cached"
            );
            return false;
        }
        state.entries.insert(key, value);
        true
    }

    /// Stores a mutation result unconditionally.
    pub async fn prime(&self, key: QueryKey, value: CachedValue) {
        self.state.write().await.entries.insert(key, value);
    }

    /// Removes every entry matching `predicate` and moves the generation forward, so reads
    /// already in flight cannot repopulate what was just invalidated.
    pub async fn invalidate_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&QueryKey) -> bool,
    {
        let mut state = self.state.write().await;
        state.generation += 1;
        let before = state.entries.len();
        state.entries.retain(|key, _| !predicate(key));
        let removed = before - state.entries.len();
        debug!(event_name = "client.cache.invalidated", removed, "cache entries invalidated");
        removed
    }

    pub async fn invalidate(&self, key: &QueryKey) -> usize {
        self.invalidate_where(|candidate| candidate == key).await
    }

    pub async fn clear(&self) {
        self.invalidate_where(|_| true).await;
    }
}

/// Bounded exponential backoff for reads. Mutations never go through this.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, base_delay_ms: 1_000, max_delay_ms: 30_000 }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt < self.max_retries => {
                    let delay = self.backoff(attempt);
                    warn!(
                        event_name = "client.read.retry",
                        operation,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transient read failure; retrying"
                    );
                    attempt += 1;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use approvly_core::domain::request::RequestId;
    use approvly_core::errors::ApiError;

    use super::{CachedValue, QueryCache, QueryKey, RetryPolicy};
    use crate::repositories::RequestFilter;

    #[tokio::test]
    async fn stale_read_is_not_written_back() {
        let cache = QueryCache::new();
        let key = QueryKey::Requests(RequestFilter::default());

        let ticket = cache.begin_read().await;
        cache.invalidate_where(QueryKey::is_request_list).await;

        assert!(!cache.store(ticket, key.clone(), CachedValue::Requests(Vec::new())).await);
        assert!(!cache.contains(&key).await);

        let fresh = cache.begin_read().await;
        assert!(cache.store(fresh, key.clone(), CachedValue::Requests(Vec::new())).await);
        assert!(cache.contains(&key).await);
    }

    #[tokio::test]
    async fn invalidation_only_touches_matching_keys() {
        let cache = QueryCache::new();
        let ticket = cache.begin_read().await;
        for filter in [RequestFilter::mine(), RequestFilter::default()] {
            cache.store(ticket, QueryKey::Requests(filter), CachedValue::Requests(vec![])).await;
        }
        cache.store(ticket, QueryKey::Policies, CachedValue::Policies(vec![])).await;

        assert_eq!(cache.invalidate_where(QueryKey::is_request_list).await, 2);
        assert!(cache.contains(&QueryKey::Policies).await);
        assert_eq!(cache.invalidate(&QueryKey::Request(RequestId(1))).await, 0);
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(10), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_then_surfaced() {
        let policy = RetryPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 };
        let calls = AtomicU32::new(0);

        let result: Result<(), ApiError> = policy
            .run("list", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::Network("down".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(ApiError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_failures_are_not_retried() {
        let policy = RetryPolicy { max_retries: 5, base_delay_ms: 0, max_delay_ms: 0 };
        let calls = AtomicU32::new(0);

        let result: Result<(), ApiError> = policy
            .run("get", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::not_found("gone")) }
            })
            .await;

        assert!(matches!(result, Err(ApiError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
