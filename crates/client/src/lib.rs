pub mod queries;
pub mod repositories;
pub mod session;
pub mod surface;
pub mod transport;

pub use queries::{
    AnalyticsStore, CachedValue, PolicyStore, QueryCache, QueryKey, RequestStore, RetryPolicy,
};
pub use repositories::{
    AnalyticsRepository, AuthService, HttpAnalyticsRepository, HttpPolicyRepository,
    HttpRequestRepository, InMemoryApprovalService, PolicyRepository, RequestFilter,
    RequestRepository,
};
pub use session::{FileSessionStore, InMemorySessionStore, Session, SessionError, SessionStore};
pub use surface::RequestDetailSurface;
pub use transport::ApiClient;
