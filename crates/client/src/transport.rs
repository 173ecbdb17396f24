use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use approvly_core::config::ApiConfig;
use approvly_core::errors::ApiError;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::session::Session;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Auth {
    Bearer,
    Anonymous,
}

/// JSON-over-HTTP client shared by every repository.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        session: Arc<Session>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ApiError::Network(format!("could not build http client: {error}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url, session })
    }

    pub fn from_config(config: &ApiConfig, session: Arc<Session>) -> Result<Self, ApiError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs), session)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let body = self.send(Method::GET, path, query, None, Auth::Bearer).await?;
        decode(path, &body)
    }

    pub async fn post<B, T>(&self, path: &str, payload: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let body = self.send(Method::POST, path, &[], Some(encode(payload)?), Auth::Bearer).await?;
        decode(path, &body)
    }

    /// Register and login: no bearer token is attached.
    pub async fn post_anonymous<B, T>(&self, path: &str, payload: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let body =
            self.send(Method::POST, path, &[], Some(encode(payload)?), Auth::Anonymous).await?;
        decode(path, &body)
    }

    pub async fn put<B, T>(&self, path: &str, payload: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let body = self.send(Method::PUT, path, &[], Some(encode(payload)?), Auth::Bearer).await?;
        decode(path, &body)
    }

    /// Posts and ignores whatever body comes back.
    pub async fn post_unit<B>(&self, path: &str, payload: &B) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        self.send(Method::POST, path, &[], Some(encode(payload)?), Auth::Bearer).await.map(|_| ())
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, path, &[], None, Auth::Bearer).await.map(|_| ())
    }

    /// Reachability check against the API root. Sends no credentials and leaves the
    /// session alone; any HTTP status counts as reachable.
    pub async fn probe(&self) -> Result<u16, ApiError> {
        let response = self
            .http
            .get(format!("{}/", self.base_url))
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string())
            .send()
            .await
            .map_err(|error| ApiError::Network(error.to_string()))?;
        Ok(response.status().as_u16())
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        payload: Option<Value>,
        auth: Auth,
    ) -> Result<String, ApiError> {
        let request_id = Uuid::new_v4().to_string();
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(REQUEST_ID_HEADER, &request_id)
            .header(reqwest::header::ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if auth == Auth::Bearer {
            if let Some(bearer) = self.session.bearer() {
                request = request.header(reqwest::header::AUTHORIZATION, bearer);
            }
        }
        if let Some(payload) = payload {
            request = request.json(&payload);
        }

        debug!(
            event_name = "client.http.request",
            method = %method,
            path,
            request_id = %request_id,
            "sending api request"
        );

        let response = request.send().await.map_err(|error| {
            warn!(
                event_name = "client.http.request_failed",
                method = %method,
                path,
                request_id = %request_id,
                error_class = "network",
                error = %error,
                "api request did not complete"
            );
            ApiError::Network(error.to_string())
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| ApiError::Network(error.to_string()))?;
        if status.is_success() {
            return Ok(body);
        }

        let error = error_from_response(status, &body);
        warn!(
            event_name = "client.http.request_failed",
            method = %method,
            path,
            request_id = %request_id,
            status = status.as_u16(),
            error_class = error.class(),
            "api request was rejected"
        );
        if matches!(error, ApiError::Auth { .. }) {
            self.session.teardown();
        }
        Err(error)
    }
}

fn encode<B: Serialize + ?Sized>(payload: &B) -> Result<Value, ApiError> {
    serde_json::to_value(payload)
        .map_err(|error| ApiError::Decode(format!("could not encode request body: {error}")))
}

fn decode<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, ApiError> {
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body)
        .map_err(|error| ApiError::Decode(format!("unexpected response from {path}: {error}")))
}

/// Maps a non-success response onto the error taxonomy.
pub fn error_from_response(status: StatusCode, body: &str) -> ApiError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let fields = parsed.as_ref().map(field_messages).unwrap_or_default();
    let message = parsed
        .as_ref()
        .and_then(top_level_message)
        .or_else(|| summarize_fields(&fields))
        .or_else(|| {
            Some(body.trim().to_string()).filter(|text| !text.is_empty() && text.len() < 300)
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    match status.as_u16() {
        401 => ApiError::Auth { message },
        403 => ApiError::Forbidden { message },
        404 => ApiError::NotFound { message },
        400..=499 => ApiError::Validation { message, fields },
        code => ApiError::Server { status: code, message },
    }
}

fn top_level_message(value: &Value) -> Option<String> {
    ["message", "detail", "error"].iter().find_map(|key| {
        value.get(key).and_then(Value::as_str).map(str::to_string).filter(|text| !text.is_empty())
    })
}

/// `{"field": ["msg", ...]}` or `{"field": "msg"}` entries, excluding the top-level keys.
fn field_messages(value: &Value) -> BTreeMap<String, Vec<String>> {
    let Some(object) = value.as_object() else {
        return BTreeMap::new();
    };

    object
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "message" | "detail" | "error" | "code"))
        .filter_map(|(key, value)| {
            let messages: Vec<String> = match value {
                Value::String(text) => vec![text.clone()],
                Value::Array(items) => {
                    items.iter().filter_map(Value::as_str).map(str::to_string).collect()
                }
                _ => Vec::new(),
            };
            (!messages.is_empty()).then(|| (key.clone(), messages))
        })
        .collect()
}

fn summarize_fields(fields: &BTreeMap<String, Vec<String>>) -> Option<String> {
    if fields.is_empty() {
        return None;
    }
    Some(
        fields
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
            .collect::<Vec<_>>()
            .join("; "),
    )
}
