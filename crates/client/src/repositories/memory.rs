//! In-process stand-in for the remote approval service.
//!
//! Enforces the same contract the server does: role checks, owner-only edits while pending,
//! the decision state machine and payload validation. Policies are stored, never evaluated.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use rust_decimal::prelude::ToPrimitive;
use tokio::sync::{RwLock, RwLockWriteGuard};

use approvly_core::domain::analytics::{
    AnalyticsFilter, AnalyticsSummary, FinancialSummary, PerformanceMetrics,
};
use approvly_core::domain::policy::{Policy, PolicyDraft, PolicyId};
use approvly_core::domain::request::{
    ApprovalRequest, DiscountDetails, ExpenseDetails, LeaveDetails, RequestAction, RequestDetails,
    RequestId, Requester,
};
use approvly_core::domain::user::{User, UserId, UserRole};
use approvly_core::errors::ApiError;
use approvly_core::lifecycle::{Actor, LifecycleEvent, RequestLifecycle};
use approvly_core::validation::{validate_details, validate_policy, ValidationErrors};

use super::{AnalyticsRepository, PolicyRepository, RequestFilter, RequestRepository};

const REQUEST_NOT_FOUND: &str = "No ApprovalRequest matches the given query.";
const POLICY_NOT_FOUND: &str = "No Policy matches the given query.";
const PERMISSION_DENIED: &str = "You do not have permission to perform this action.";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub lists: usize,
    pub gets: usize,
    pub mutations: usize,
}

#[derive(Default)]
struct ServiceState {
    next_request_id: i64,
    next_policy_id: i64,
    requests: BTreeMap<RequestId, ApprovalRequest>,
    policies: BTreeMap<PolicyId, Policy>,
    users: BTreeMap<UserId, User>,
    failures: VecDeque<ApiError>,
    calls: CallCounts,
}

/// Handles share state; [`InMemoryApprovalService::as_user`] switches the viewer.
#[derive(Clone)]
pub struct InMemoryApprovalService {
    state: Arc<RwLock<ServiceState>>,
    viewer: User,
    lifecycle: RequestLifecycle,
}

impl InMemoryApprovalService {
    pub fn new(viewer: User) -> Self {
        Self {
            state: Arc::new(RwLock::new(ServiceState::default())),
            viewer,
            lifecycle: RequestLifecycle,
        }
    }

    pub fn as_user(&self, viewer: User) -> Self {
        Self { state: Arc::clone(&self.state), viewer, lifecycle: RequestLifecycle }
    }

    pub fn viewer(&self) -> &User {
        &self.viewer
    }

    /// Queues a failure returned by the next call, whatever it is.
    pub async fn fail_next(&self, error: ApiError) {
        self.state.write().await.failures.push_back(error);
    }

    pub async fn calls(&self) -> CallCounts {
        self.state.read().await.calls
    }

    /// Stores a request as-is, bypassing validation and the lifecycle.
    pub async fn seed(&self, request: ApprovalRequest) {
        let mut state = self.state.write().await;
        state.next_request_id = state.next_request_id.max(request.id.0);
        state.requests.insert(request.id, request);
    }

    fn actor(&self) -> Actor {
        Actor::from(&self.viewer)
    }

    fn sees(&self, request: &ApprovalRequest) -> bool {
        self.viewer.role.can_decide() || request.is_owned_by(self.viewer.id)
    }

    async fn begin(&self, call: Call) -> Result<RwLockWriteGuard<'_, ServiceState>, ApiError> {
        let mut state = self.state.write().await;
        state.users.insert(self.viewer.id, self.viewer.clone());
        match call {
            Call::List => state.calls.lists += 1,
            Call::Get => state.calls.gets += 1,
            Call::Mutation => state.calls.mutations += 1,
        }
        match state.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }

    fn visible(&self, state: &ServiceState, id: RequestId) -> Result<ApprovalRequest, ApiError> {
        state
            .requests
            .get(&id)
            .filter(|request| self.sees(request))
            .cloned()
            .ok_or_else(|| ApiError::not_found(REQUEST_NOT_FOUND))
    }

    async fn insert_new(&self, details: RequestDetails) -> Result<ApprovalRequest, ApiError> {
        validate_details(&details)?;
        let mut state = self.begin(Call::Mutation).await?;
        state.next_request_id += 1;
        let request = ApprovalRequest {
            id: RequestId(state.next_request_id),
            requester: Requester { id: self.viewer.id, username: self.viewer.username.clone() },
            status: self.lifecycle.initial_status(),
            is_flagged: false,
            decision_reason: None,
            created_at: Utc::now(),
            details,
        };
        state.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn transition(
        &self,
        id: RequestId,
        event: LifecycleEvent,
    ) -> Result<ApprovalRequest, ApiError> {
        let mut state = self.begin(Call::Mutation).await?;
        let current = self.visible(&state, id)?;
        let outcome = self.lifecycle.apply(&current, &event, &self.actor())?;
        let updated = current
            .apply_outcome(&outcome)
            .ok_or_else(|| ApiError::not_found(REQUEST_NOT_FOUND))?;
        state.requests.insert(id, updated.clone());
        Ok(updated)
    }

    fn require_admin(&self) -> Result<(), ApiError> {
        if self.viewer.role == UserRole::Admin {
            Ok(())
        } else {
            Err(ApiError::forbidden(PERMISSION_DENIED))
        }
    }
}

#[derive(Clone, Copy)]
enum Call {
    List,
    Get,
    Mutation,
}

#[async_trait]
impl RequestRepository for InMemoryApprovalService {
    async fn list(&self, filter: &RequestFilter) -> Result<Vec<ApprovalRequest>, ApiError> {
        let state = self.begin(Call::List).await?;
        let only_mine = filter.mine.unwrap_or(false) || !self.viewer.role.can_decide();

        let mut requests: Vec<ApprovalRequest> = state
            .requests
            .values()
            .filter(|request| !only_mine || request.is_owned_by(self.viewer.id))
            .filter(|request| filter.status.map_or(true, |status| request.status == status))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    async fn get(&self, id: RequestId) -> Result<ApprovalRequest, ApiError> {
        let state = self.begin(Call::Get).await?;
        self.visible(&state, id)
    }

    async fn create_leave(&self, details: &LeaveDetails) -> Result<ApprovalRequest, ApiError> {
        self.insert_new(RequestDetails::Leave(details.clone())).await
    }

    async fn create_expense(
        &self,
        details: &ExpenseDetails,
    ) -> Result<ApprovalRequest, ApiError> {
        self.insert_new(RequestDetails::Expense(details.clone())).await
    }

    async fn create_discount(
        &self,
        details: &DiscountDetails,
    ) -> Result<ApprovalRequest, ApiError> {
        self.insert_new(RequestDetails::Discount(details.clone())).await
    }

    async fn update(
        &self,
        id: RequestId,
        details: &RequestDetails,
    ) -> Result<ApprovalRequest, ApiError> {
        let mut state = self.begin(Call::Mutation).await?;
        let mut current = self.visible(&state, id)?;
        self.lifecycle.apply(&current, &LifecycleEvent::Update, &self.actor())?;

        if details.kind() != current.kind() {
            let mut errors = ValidationErrors::default();
            errors.push("request_type", "Request type cannot be changed");
            return Err(errors.into());
        }
        validate_details(details)?;

        current.details = details.clone();
        state.requests.insert(id, current.clone());
        Ok(current)
    }

    async fn delete(&self, id: RequestId) -> Result<(), ApiError> {
        let mut state = self.begin(Call::Mutation).await?;
        let current = self.visible(&state, id)?;
        self.lifecycle.apply(&current, &LifecycleEvent::Delete, &self.actor())?;
        state.requests.remove(&id);
        Ok(())
    }

    async fn act(
        &self,
        id: RequestId,
        action: &RequestAction,
    ) -> Result<ApprovalRequest, ApiError> {
        self.transition(id, LifecycleEvent::Decide(action.clone())).await
    }

    async fn flag(&self, id: RequestId, is_flagged: bool) -> Result<ApprovalRequest, ApiError> {
        self.transition(id, LifecycleEvent::SetFlag(is_flagged)).await
    }
}

#[async_trait]
impl PolicyRepository for InMemoryApprovalService {
    async fn list(&self) -> Result<Vec<Policy>, ApiError> {
        let state = self.begin(Call::List).await?;
        self.require_admin()?;
        Ok(state.policies.values().cloned().collect())
    }

    async fn get(&self, id: PolicyId) -> Result<Policy, ApiError> {
        let state = self.begin(Call::Get).await?;
        self.require_admin()?;
        state.policies.get(&id).cloned().ok_or_else(|| ApiError::not_found(POLICY_NOT_FOUND))
    }

    async fn create(&self, draft: &PolicyDraft) -> Result<Policy, ApiError> {
        self.require_admin()?;
        validate_policy(draft)?;
        let mut state = self.begin(Call::Mutation).await?;
        state.next_policy_id += 1;
        let id = PolicyId(state.next_policy_id);
        let policy = draft.clone().into_policy(id);
        state.policies.insert(id, policy.clone());
        Ok(policy)
    }

    async fn update(&self, id: PolicyId, draft: &PolicyDraft) -> Result<Policy, ApiError> {
        self.require_admin()?;
        validate_policy(draft)?;
        let mut state = self.begin(Call::Mutation).await?;
        if !state.policies.contains_key(&id) {
            return Err(ApiError::not_found(POLICY_NOT_FOUND));
        }
        let policy = draft.clone().into_policy(id);
        state.policies.insert(id, policy.clone());
        Ok(policy)
    }

    async fn delete(&self, id: PolicyId) -> Result<(), ApiError> {
        self.require_admin()?;
        let mut state = self.begin(Call::Mutation).await?;
        state.policies.remove(&id).map(|_| ()).ok_or_else(|| ApiError::not_found(POLICY_NOT_FOUND))
    }
}

#[async_trait]
impl AnalyticsRepository for InMemoryApprovalService {
    async fn summary(&self, filter: &AnalyticsFilter) -> Result<AnalyticsSummary, ApiError> {
        let state = self.begin(Call::Get).await?;
        if !self.viewer.role.can_decide() {
            return Err(ApiError::forbidden(PERMISSION_DENIED));
        }

        let matching: Vec<&ApprovalRequest> = state
            .requests
            .values()
            .filter(|request| filter.user_id.map_or(true, |id| request.requester.id == id))
            .filter(|request| filter.request_type.map_or(true, |kind| request.kind() == kind))
            .filter(|request| {
                filter.month.map_or(true, |month| request.created_at.month() == month)
            })
            .filter(|request| filter.year.map_or(true, |year| request.created_at.year() == year))
            .filter(|request| {
                filter.grade.as_deref().map_or(true, |grade| {
                    state
                        .users
                        .get(&request.requester.id)
                        .is_some_and(|user| user.grade.as_str() == grade)
                })
            })
            .collect();

        let mut summary = AnalyticsSummary {
            total_requests: matching.len() as u64,
            performance_metrics: PerformanceMetrics { avg_processing_time_hours: None },
            ..AnalyticsSummary::default()
        };
        let mut discounts = Vec::new();
        let mut financial = FinancialSummary::default();

        for request in &matching {
            *summary.status_counts.entry(request.status.as_str().to_string()).or_default() += 1;
            *summary.type_counts.entry(request.kind().as_str().to_string()).or_default() += 1;
            if request.is_flagged {
                summary.flagged_count += 1;
            }
            match &request.details {
                RequestDetails::Expense(expense) => {
                    financial.total_expense_amount += expense.amount.to_f64().unwrap_or(0.0);
                }
                RequestDetails::Discount(discount) => {
                    discounts.push(discount.discount_percentage.to_f64().unwrap_or(0.0));
                }
                RequestDetails::Leave(_) => {}
            }
        }
        if !discounts.is_empty() {
            financial.avg_discount_percentage =
                discounts.iter().sum::<f64>() / discounts.len() as f64;
        }
        summary.financial_summary = financial;

        Ok(summary)
    }
}
