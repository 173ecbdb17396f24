pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod validation;
pub mod view;

pub use domain::analytics::{AnalyticsFilter, AnalyticsSummary};
pub use domain::policy::{Policy, PolicyDraft, PolicyId, ViolationAction};
pub use domain::request::{
    ApprovalRequest, DecisionAction, DiscountDetails, ExpenseDetails, LeaveDetails, RequestAction,
    RequestDetails, RequestId, RequestKind, RequestStatus,
};
pub use domain::user::{User, UserGrade, UserId, UserRole};
pub use errors::{ApiError, DomainError, Feedback};
pub use lifecycle::{Actor, LifecycleError, LifecycleEvent, RequestLifecycle};
pub use validation::{FieldError, ValidationErrors};
