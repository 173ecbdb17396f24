//! HTTP repositories against a mock server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use approvly_client::queries::RetryPolicy;
use approvly_client::repositories::{
    AnalyticsRepository, AuthService, HttpAnalyticsRepository, HttpPolicyRepository,
    HttpRequestRepository, PolicyRepository, RequestFilter, RequestRepository,
};
use approvly_client::session::{InMemorySessionStore, Session, SessionStore};
use approvly_client::transport::ApiClient;
use approvly_core::domain::analytics::AnalyticsFilter;
use approvly_core::domain::request::{
    DecisionAction, RequestAction, RequestId, RequestKind, RequestStatus,
};
use approvly_core::domain::user::{LoginRequest, UserRole};
use approvly_core::errors::ApiError;

fn request_json(id: i64, status: &str) -> Value {
    json!({
        "id": id,
        "user": 5,
        "username": "ana",
        "request_type": "LEAVE",
        "status": status,
        "decision_reason": null,
        "is_flagged": false,
        "created_at": "2024-01-02T09:00:00Z",
        "details": {
            "leave_type": "PAID",
            "from_date": "2024-01-10",
            "to_date": "2024-01-12",
            "reason": "trip"
        }
    })
}

fn user_json() -> Value {
    json!({
        "id": 9,
        "username": "mara",
        "email": "mara@example.com",
        "role": "MANAGER",
        "grade": "GRADE2"
    })
}

fn client_with_token(server: &MockServer, store: Arc<InMemorySessionStore>) -> ApiClient {
    let session = Arc::new(Session::new(store));
    session.init().expect("init session");
    ApiClient::new(server.uri(), Duration::from_secs(5), session).expect("client")
}

fn authed_client(server: &MockServer) -> ApiClient {
    client_with_token(server, Arc::new(InMemorySessionStore::with_tokens("token-123", "refresh-9")))
}

#[tokio::test]
async fn list_sends_bearer_token_and_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/approval/requests/"))
        .and(header("Authorization", "Bearer token-123"))
        .and(header_exists("X-Request-Id"))
        .and(query_param("mine", "true"))
        .and(query_param("status", "PENDING"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([request_json(2, "PENDING"), request_json(1, "PENDING")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let repository = HttpRequestRepository::new(authed_client(&server));
    let requests = repository
        .list(&RequestFilter::mine().with_status(RequestStatus::Pending))
        .await
        .expect("list");

    let ids: Vec<i64> = requests.iter().map(|request| request.id.0).collect();
    assert_eq!(ids, vec![2, 1]);
    assert_eq!(requests[0].kind(), RequestKind::Leave);
}

#[tokio::test]
async fn action_posts_decision_payload() {
    let server = MockServer::start().await;
    let mut approved = request_json(42, "APPROVED");
    approved["decision_reason"] = json!("fine");
    Mock::given(method("POST"))
        .and(path("/api/approval/requests/42/action/"))
        .and(body_json(json!({"action": "APPROVED", "reason": "fine"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(approved))
        .expect(1)
        .mount(&server)
        .await;

    let repository = HttpRequestRepository::new(authed_client(&server));
    let decided = repository
        .act(RequestId(42), &RequestAction::new(DecisionAction::Approved).with_reason("fine"))
        .await
        .expect("act");

    assert_eq!(decided.status, RequestStatus::Approved);
    assert_eq!(decided.decision_reason.as_deref(), Some("fine"));
}

#[tokio::test]
async fn flag_posts_flag_payload() {
    let server = MockServer::start().await;
    let mut flagged = request_json(3, "REJECTED");
    flagged["is_flagged"] = json!(true);
    Mock::given(method("POST"))
        .and(path("/api/approval/requests/3/flag/"))
        .and(body_json(json!({"is_flagged": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(flagged))
        .mount(&server)
        .await;

    let repository = HttpRequestRepository::new(authed_client(&server));
    let result = repository.flag(RequestId(3), true).await.expect("flag");

    assert!(result.is_flagged);
    assert_eq!(result.status, RequestStatus::Rejected);
}

#[tokio::test]
async fn unauthorized_response_clears_the_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/approval/requests/7/"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"detail": "Given token not valid for any token type"})),
        )
        .mount(&server)
        .await;

    let store = Arc::new(InMemorySessionStore::with_tokens("expired", "refresh"));
    let client = client_with_token(&server, store.clone());
    let repository = HttpRequestRepository::new(client.clone());

    let error = repository.get(RequestId(7)).await.expect_err("401");
    assert!(matches!(error, ApiError::Auth { .. }));
    assert!(!client.session().is_authenticated());
    assert!(store.load().expect("load").is_none());
}

#[tokio::test]
async fn repeated_delete_surfaces_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/approval/requests/7/"))
        .respond_with(ResponseTemplate::new(204))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/approval/requests/7/"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"detail": "No ApprovalRequest matches the given query."})),
        )
        .mount(&server)
        .await;

    let repository = HttpRequestRepository::new(authed_client(&server));
    repository.delete(RequestId(7)).await.expect("first delete");

    let error = repository.delete(RequestId(7)).await.expect_err("second delete");
    assert_eq!(error, ApiError::not_found("No ApprovalRequest matches the given query."));
}

#[tokio::test]
async fn server_field_errors_are_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/approval/expense/"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"amount": ["Expense exceeds your grade limit."]})),
        )
        .mount(&server)
        .await;

    let repository = HttpRequestRepository::new(authed_client(&server));
    let details = approvly_core::domain::request::ExpenseDetails {
        amount: rust_decimal::Decimal::new(90_000, 0),
        category: approvly_core::domain::request::ExpenseCategory::Other,
        description: None,
    };
    let error = repository.create_expense(&details).await.expect_err("rejected");

    let fields = error.field_errors().expect("field errors");
    assert_eq!(fields["amount"], vec!["Expense exceeds your grade limit.".to_string()]);
}

#[tokio::test]
async fn forbidden_does_not_clear_the_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/approval/requests/4/action/"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({"detail": "You do not have permission to perform this action."})),
        )
        .mount(&server)
        .await;

    let client = authed_client(&server);
    let repository = HttpRequestRepository::new(client.clone());
    let error = repository
        .act(RequestId(4), &RequestAction::new(DecisionAction::Rejected))
        .await
        .expect_err("forbidden");

    assert!(matches!(error, ApiError::Forbidden { .. }));
    assert!(client.session().is_authenticated());
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let session = Arc::new(Session::in_memory());
    let client =
        ApiClient::new("http://127.0.0.1:9", Duration::from_secs(2), session).expect("client");
    let repository = HttpRequestRepository::new(client);

    let error = repository.list(&RequestFilter::default()).await.expect_err("unreachable");
    assert!(matches!(error, ApiError::Network(_)));
    assert!(error.is_transient());
}

#[tokio::test]
async fn malformed_entity_is_a_decode_error() {
    let server = MockServer::start().await;
    let mut broken = request_json(5, "PENDING");
    broken["details"] = json!({"amount": "12.00", "category": "FOOD"});
    Mock::given(method("GET"))
        .and(path("/api/approval/requests/5/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(broken))
        .mount(&server)
        .await;

    let repository = HttpRequestRepository::new(authed_client(&server));
    let error = repository.get(RequestId(5)).await.expect_err("leave details missing");
    assert!(matches!(error, ApiError::Decode(_)));
}

#[tokio::test]
async fn login_establishes_session_without_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .and(body_json(json!({"username": "mara", "password": "s3cret-pass"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "fresh-access",
            "refresh": "fresh-refresh",
            "user": user_json()
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/approval/policies/"))
        .and(header("Authorization", "Bearer fresh-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemorySessionStore::default());
    let session = Arc::new(Session::new(store.clone()));
    let client = ApiClient::new(server.uri(), Duration::from_secs(5), session).expect("client");
    let auth = AuthService::new(client.clone());

    let user = auth
        .login(&LoginRequest { username: "mara".to_string(), password: "s3cret-pass".to_string() })
        .await
        .expect("login");
    assert_eq!(user.role, UserRole::Manager);
    assert_eq!(client.session().current_user().map(|user| user.username), Some("mara".to_string()));
    assert!(store.load().expect("load").is_some());

    let policies = HttpPolicyRepository::new(client).list().await.expect("policies");
    assert!(policies.is_empty());
}

#[tokio::test]
async fn login_with_blank_fields_never_hits_the_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let auth = AuthService::new(authed_client(&server));
    let error = auth
        .login(&LoginRequest { username: " ".to_string(), password: String::new() })
        .await
        .expect_err("invalid");
    assert!(matches!(error, ApiError::Validation { .. }));
}

#[tokio::test]
async fn restore_failure_clears_persisted_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = Arc::new(InMemorySessionStore::with_tokens("stale", "stale-refresh"));
    let session = Arc::new(Session::new(store.clone()));
    let client = ApiClient::new(server.uri(), Duration::from_secs(5), session).expect("client");

    let error = AuthService::new(client.clone())
        .with_retry(RetryPolicy::none())
        .restore()
        .await
        .expect_err("server error");
    assert!(matches!(error, ApiError::Server { status: 500, .. }));
    assert!(!client.session().is_authenticated());
    assert!(store.load().expect("load").is_none());
}

#[tokio::test]
async fn restore_rides_out_a_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .and(header("Authorization", "Bearer kept"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemorySessionStore::with_tokens("kept", "kept-refresh"));
    let session = Arc::new(Session::new(store.clone()));
    let client = ApiClient::new(server.uri(), Duration::from_secs(5), session).expect("client");
    let retry = RetryPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 };

    let user = AuthService::new(client.clone())
        .with_retry(retry)
        .restore()
        .await
        .expect("restore")
        .expect("persisted user");
    assert_eq!(user.username, "mara");
    assert!(client.session().is_authenticated());
    assert!(store.load().expect("load").is_some());
}

#[tokio::test]
async fn logout_clears_session_even_when_server_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout/"))
        .and(body_json(json!({"refresh": "refresh-9"})))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let client = authed_client(&server);
    AuthService::new(client.clone()).logout().await;

    assert!(!client.session().is_authenticated());
    assert!(client.session().refresh_token().is_none());
}

#[tokio::test]
async fn analytics_summary_passes_filters_as_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/approval/admin/analytics/summary/"))
        .and(query_param("month", "2"))
        .and(query_param("request_type", "EXPENSE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_requests": 4,
            "status_counts": {"PENDING": 1, "APPROVED": 3},
            "type_counts": {"EXPENSE": 4},
            "financial_summary": {"total_expense_amount": 410.5, "avg_discount_percentage": 0.0},
            "performance_metrics": {"avg_processing_time_hours": 5.25},
            "flagged_count": 1
        })))
        .mount(&server)
        .await;

    let repository = HttpAnalyticsRepository::new(authed_client(&server));
    let filter = AnalyticsFilter {
        month: Some(2),
        request_type: Some(RequestKind::Expense),
        ..AnalyticsFilter::default()
    };
    let summary = repository.summary(&filter).await.expect("summary");

    assert_eq!(summary.total_requests, 4);
    assert_eq!(summary.status_counts["APPROVED"], 3);
    assert_eq!(summary.performance_metrics.avg_processing_time_hours, Some(5.25));
}
