//! One request on screen, plus the controls its viewer may use on it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use tracing::warn;

use approvly_core::domain::request::{
    ApprovalRequest, DecisionAction, RequestAction, RequestDetails, RequestId,
};
use approvly_core::errors::ApiError;
use approvly_core::lifecycle::{Actor, LifecycleEvent};
use approvly_core::view::RequestControls;

use crate::queries::RequestStore;

const EDIT: &str = "update";
const DELETE: &str = "delete";
/// Approve, reject and needs-review share one latch: a request takes one decision at a time.
pub const DECISION: &str = "decision";

/// Control state lives behind interior mutability so that a second trigger of a control
/// already in flight can be observed and refused.
pub struct RequestDetailSurface {
    store: RequestStore,
    viewer: Actor,
    request: RwLock<ApprovalRequest>,
    in_flight: Mutex<HashSet<&'static str>>,
    deleted: AtomicBool,
}

struct InFlightGuard<'a> {
    controls: &'a Mutex<HashSet<&'static str>>,
    control: &'static str,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.controls.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).remove(self.control);
    }
}

impl RequestDetailSurface {
    pub fn new(store: RequestStore, viewer: Actor, request: ApprovalRequest) -> Self {
        Self {
            store,
            viewer,
            request: RwLock::new(request),
            in_flight: Mutex::new(HashSet::new()),
            deleted: AtomicBool::new(false),
        }
    }

    pub async fn load(store: RequestStore, viewer: Actor, id: RequestId) -> Result<Self, ApiError> {
        let request = store.get(id).await?;
        Ok(Self::new(store, viewer, request))
    }

    pub fn request(&self) -> ApprovalRequest {
        self.request.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }

    pub fn is_in_flight(&self, control: &str) -> bool {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).contains(control)
    }

    /// Controls offered to the viewer. Nothing is offered once the request is deleted, and a
    /// control in flight is withheld until it settles.
    pub fn controls(&self) -> RequestControls {
        if self.is_deleted() {
            return RequestControls::default();
        }
        let mut controls = RequestControls::for_viewer(&self.request(), &self.viewer);
        controls.can_edit &= !self.is_in_flight(EDIT);
        controls.can_delete &= !self.is_in_flight(DELETE);
        controls.can_flag &= !self.is_in_flight(flag_control(!self.request().is_flagged));
        if self.is_in_flight(DECISION) {
            controls.decisions.clear();
        }
        controls
    }

    pub async fn approve(&self, reason: Option<String>) -> Result<ApprovalRequest, ApiError> {
        self.decide(DecisionAction::Approved, reason).await
    }

    pub async fn reject(&self, reason: Option<String>) -> Result<ApprovalRequest, ApiError> {
        self.decide(DecisionAction::Rejected, reason).await
    }

    pub async fn needs_review(&self, reason: Option<String>) -> Result<ApprovalRequest, ApiError> {
        self.decide(DecisionAction::NeedsReview, reason).await
    }

    pub async fn decide(
        &self,
        action: DecisionAction,
        reason: Option<String>,
    ) -> Result<ApprovalRequest, ApiError> {
        let control = LifecycleEvent::decide(action).name();
        if !self.controls_snapshot().offers(action) {
            return Err(ApiError::ControlUnavailable { control });
        }
        self.force_decide(action, reason).await
    }

    /// Sends the decision even when the control is not offered; the server's rejection comes
    /// back unchanged.
    pub async fn force_decide(
        &self,
        action: DecisionAction,
        reason: Option<String>,
    ) -> Result<ApprovalRequest, ApiError> {
        let control = LifecycleEvent::decide(action).name();
        let _guard = self.claim(DECISION)?;
        let mut payload = RequestAction::new(action);
        if let Some(reason) = reason {
            payload = payload.with_reason(reason);
        }
        let id = self.request().id;
        self.settle(control, self.store.act(id, &payload).await)
    }

    pub async fn set_flag(&self, is_flagged: bool) -> Result<ApprovalRequest, ApiError> {
        let control = flag_control(is_flagged);
        if !self.controls_snapshot().can_flag {
            return Err(ApiError::ControlUnavailable { control });
        }
        let _guard = self.claim(control)?;
        let id = self.request().id;
        self.settle(control, self.store.flag(id, is_flagged).await)
    }

    pub async fn toggle_flag(&self) -> Result<ApprovalRequest, ApiError> {
        let next = !self.request().is_flagged;
        self.set_flag(next).await
    }

    pub async fn update(&self, details: &RequestDetails) -> Result<ApprovalRequest, ApiError> {
        if !self.controls_snapshot().can_edit {
            return Err(ApiError::ControlUnavailable { control: EDIT });
        }
        let _guard = self.claim(EDIT)?;
        let id = self.request().id;
        self.settle(EDIT, self.store.update(id, details).await)
    }

    pub async fn delete(&self) -> Result<(), ApiError> {
        if !self.controls_snapshot().can_delete {
            return Err(ApiError::ControlUnavailable { control: DELETE });
        }
        let _guard = self.claim(DELETE)?;
        let id = self.request().id;
        match self.store.delete(id).await {
            Ok(()) => {
                self.deleted.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(error) => Err(self.report(DELETE, error)),
        }
    }

    /// Reloads from the store. On failure the current request stays displayed.
    pub async fn refresh(&self) -> Result<ApprovalRequest, ApiError> {
        let id = self.request().id;
        self.settle("refresh", self.store.get(id).await)
    }

    /// Lifecycle-derived availability, ignoring what is in flight. Claiming the control
    /// reports `InFlight` on its own.
    fn controls_snapshot(&self) -> RequestControls {
        if self.is_deleted() {
            return RequestControls::default();
        }
        RequestControls::for_viewer(&self.request(), &self.viewer)
    }

    fn claim(&self, control: &'static str) -> Result<InFlightGuard<'_>, ApiError> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !in_flight.insert(control) {
            return Err(ApiError::InFlight { control });
        }
        Ok(InFlightGuard { controls: &self.in_flight, control })
    }

    fn settle(
        &self,
        control: &'static str,
        result: Result<ApprovalRequest, ApiError>,
    ) -> Result<ApprovalRequest, ApiError> {
        match result {
            Ok(entity) => {
                *self.request.write().unwrap_or_else(|poisoned| poisoned.into_inner()) =
                    entity.clone();
                Ok(entity)
            }
            Err(error) => Err(self.report(control, error)),
        }
    }

    fn report(&self, control: &'static str, error: ApiError) -> ApiError {
        warn!(
            event_name = "client.surface.operation_failed",
            control,
            request_id = self.request().id.0,
            error_class = error.class(),
            error = %error,
            "request operation failed; keeping the displayed request"
        );
        error
    }
}

fn flag_control(is_flagged: bool) -> &'static str {
    LifecycleEvent::SetFlag(is_flagged).name()
}
