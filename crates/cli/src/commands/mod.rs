pub mod analytics;
pub mod auth;
pub mod config;
pub mod doctor;
pub mod policies;
pub mod requests;

use std::future::Future;
use std::sync::Arc;

use approvly_client::{
    AnalyticsStore, ApiClient, AuthService, FileSessionStore, HttpAnalyticsRepository,
    HttpPolicyRepository, HttpRequestRepository, PolicyStore, QueryCache, RequestStore,
    RetryPolicy, Session,
};
use approvly_core::config::{AppConfig, LoadOptions};
use approvly_core::domain::user::User;
use approvly_core::errors::ApiError;
use serde::Serialize;
use serde_json::Value;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_RUNTIME: u8 = 3;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with(command, Reply::new(message))
    }

    pub fn success_with(command: &str, reply: Reply) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: reply.message,
            data: reply.data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::failure_with(command, error_class, message, None, exit_code)
    }

    /// Field-level messages of a validation failure travel in `data.fields`.
    pub fn api_failure(command: &str, error: &ApiError) -> Self {
        let data = error.field_errors().filter(|fields| !fields.is_empty()).map(|fields| {
            serde_json::json!({ "fields": fields })
        });
        Self::failure_with(command, error.class(), error_message(error), data, api_exit_code(error))
    }

    fn failure_with(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        data: Option<Value>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

/// Message and optional structured payload of a successful command.
#[derive(Debug, Clone)]
pub struct Reply {
    message: String,
    data: Option<Value>,
}

impl Reply {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), data: None }
    }

    pub fn with_data<T: Serialize>(mut self, data: &T) -> Self {
        self.data = serde_json::to_value(data).ok();
        self
    }
}

pub fn api_exit_code(error: &ApiError) -> u8 {
    match error {
        ApiError::Validation { .. } => 4,
        ApiError::Auth { .. } => 5,
        ApiError::Forbidden { .. } => 6,
        ApiError::NotFound { .. } => 7,
        ApiError::Network(_) => 8,
        ApiError::Server { .. } | ApiError::Decode(_) => 9,
        ApiError::ControlUnavailable { .. } | ApiError::InFlight { .. } => 10,
    }
}

fn error_message(error: &ApiError) -> String {
    match error {
        ApiError::Auth { message } if !message.is_empty() => message.clone(),
        ApiError::Network(detail) => format!("{} ({detail})", error.user_message()),
        ApiError::Server { status, .. } => format!("{} (status {status})", error.user_message()),
        ApiError::Decode(detail) => format!("{} ({detail})", error.user_message()),
        _ => error.user_message(),
    }
}

/// Everything a command needs to talk to the API: the persisted session, one shared cache
/// and the stores built on top of them.
#[derive(Clone)]
pub struct Context {
    pub config: AppConfig,
    client: ApiClient,
    cache: Arc<QueryCache>,
    retry: RetryPolicy,
}

impl Context {
    pub fn load(command: &str, options: LoadOptions) -> Result<Self, CommandResult> {
        let config = AppConfig::load(options).map_err(|error| {
            CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            )
        })?;

        let session =
            Arc::new(Session::new(Arc::new(FileSessionStore::new(config.session.path.clone()))));
        session.init().map_err(|error| {
            CommandResult::failure(
                command,
                "session_store",
                format!("persisted session could not be loaded: {error}"),
                EXIT_RUNTIME,
            )
        })?;

        let client = ApiClient::from_config(&config.api, session)
            .map_err(|error| CommandResult::api_failure(command, &error))?;
        let retry = RetryPolicy::default().with_max_retries(config.api.read_retries);

        Ok(Self { config, client, cache: Arc::new(QueryCache::new()), retry })
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.client.clone()).with_retry(self.retry.clone())
    }

    pub fn requests(&self) -> RequestStore {
        RequestStore::new(
            Arc::new(HttpRequestRepository::new(self.client.clone())),
            Arc::clone(&self.cache),
        )
        .with_retry(self.retry.clone())
    }

    pub fn policies(&self) -> PolicyStore {
        PolicyStore::new(
            Arc::new(HttpPolicyRepository::new(self.client.clone())),
            Arc::clone(&self.cache),
        )
        .with_retry(self.retry.clone())
    }

    pub fn analytics(&self) -> AnalyticsStore {
        AnalyticsStore::new(
            Arc::new(HttpAnalyticsRepository::new(self.client.clone())),
            Arc::clone(&self.cache),
        )
        .with_retry(self.retry.clone())
    }

    /// The logged-in user, confirmed with the server.
    pub async fn viewer(&self) -> Result<User, ApiError> {
        self.auth().restore().await?.ok_or_else(|| ApiError::Auth {
            message: "not logged in; run `approvly login` first".to_string(),
        })
    }
}

/// Loads the context, drives `operation` on a single-threaded runtime and renders the outcome.
pub fn execute<F, Fut>(command: &str, options: LoadOptions, operation: F) -> CommandResult
where
    F: FnOnce(Context) -> Fut,
    Fut: Future<Output = Result<Reply, ApiError>>,
{
    let context = match Context::load(command, options) {
        Ok(context) => context,
        Err(failure) => return failure,
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            );
        }
    };

    match runtime.block_on(operation(context)) {
        Ok(reply) => CommandResult::success_with(command, reply),
        Err(error) => CommandResult::api_failure(command, &error),
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use approvly_core::errors::ApiError;
    use serde_json::Value;

    use super::{api_exit_code, CommandResult, Reply};

    fn parse(result: &CommandResult) -> Value {
        serde_json::from_str(&result.output).expect("command output is json")
    }

    #[test]
    fn success_carries_data_when_present() {
        let result = CommandResult::success_with(
            "requests.show",
            Reply::new("request 42").with_data(&serde_json::json!({"id": 42})),
        );
        let payload = parse(&result);

        assert_eq!(result.exit_code, 0);
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["id"], 42);
        assert!(payload["error_class"].is_null());
    }

    #[test]
    fn plain_success_omits_data() {
        let payload = parse(&CommandResult::success("logout", "session cleared"));
        assert!(payload.get("data").is_none());
    }

    #[test]
    fn validation_failure_reports_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("amount".to_string(), vec!["Amount must be greater than 0".to_string()]);
        let error = ApiError::Validation { message: "amount is invalid".to_string(), fields };

        let result = CommandResult::api_failure("requests.new-expense", &error);
        let payload = parse(&result);

        assert_eq!(result.exit_code, 4);
        assert_eq!(payload["error_class"], "validation");
        assert_eq!(payload["message"], "amount is invalid");
        assert_eq!(payload["data"]["fields"]["amount"][0], "Amount must be greater than 0");
    }

    #[test]
    fn each_error_class_has_its_own_exit_code() {
        let errors = [
            ApiError::validation("bad"),
            ApiError::Auth { message: "expired".to_string() },
            ApiError::forbidden("no"),
            ApiError::not_found("gone"),
            ApiError::Network("refused".to_string()),
            ApiError::Server { status: 500, message: "boom".to_string() },
            ApiError::InFlight { control: "approve" },
        ];
        let mut codes: Vec<u8> = errors.iter().map(api_exit_code).collect();
        codes.dedup();

        assert_eq!(codes.len(), errors.len());
        assert!(codes.iter().all(|code| *code > super::EXIT_RUNTIME));
    }
}
