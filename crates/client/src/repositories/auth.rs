use approvly_core::domain::user::{
    LoginRequest, LogoutRequest, RegisterRequest, RegisterResponse, TokenResponse, User,
};
use approvly_core::errors::ApiError;
use approvly_core::validation::{validate_login, validate_registration};
use secrecy::ExposeSecret;
use tracing::warn;

use crate::queries::RetryPolicy;
use crate::transport::ApiClient;

/// Login, logout and session restore on top of the shared [`ApiClient`] session.
#[derive(Clone, Debug)]
pub struct AuthService {
    client: ApiClient,
    retry: RetryPolicy,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client, retry: RetryPolicy::default() }
    }

    /// Retry policy for the `me` read behind [`AuthService::restore`].
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn register(
        &self,
        request: &RegisterRequest,
        confirm_password: &str,
    ) -> Result<RegisterResponse, ApiError> {
        validate_registration(request, confirm_password)?;
        self.client.post_anonymous("/api/auth/register/", request).await
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<User, ApiError> {
        validate_login(request)?;
        let tokens: TokenResponse = self.client.post_anonymous("/api/auth/login/", request).await?;
        let user = tokens.user.clone();
        self.client.session().establish(tokens).map_err(|error| {
            ApiError::Decode(format!(
                "login succeeded but the session could not be stored: {error}"
            ))
        })?;
        Ok(user)
    }

    pub async fn me(&self) -> Result<User, ApiError> {
        let user: User = self.client.get("/api/auth/me/", &[]).await?;
        self.client.session().set_user(user.clone());
        Ok(user)
    }

    /// Loads the user behind a persisted token. Transient failures are retried first; a
    /// failure that survives the retries clears the session.
    pub async fn restore(&self) -> Result<Option<User>, ApiError> {
        let session = self.client.session();
        let has_token = match session.init() {
            Ok(has_token) => has_token,
            Err(error) => {
                warn!(
                    event_name = "client.session.restore_failed",
                    error = %error,
                    "persisted session is unreadable"
                );
                session.teardown();
                return Ok(None);
            }
        };
        if !has_token {
            return Ok(None);
        }

        match self.retry.run("auth.me", || self.me()).await {
            Ok(user) => Ok(Some(user)),
            Err(error) => {
                session.teardown();
                Err(error)
            }
        }
    }

    /// Best-effort server logout; the local session is always cleared.
    pub async fn logout(&self) {
        let session = self.client.session();
        if let Some(refresh) = session.refresh_token() {
            let payload = LogoutRequest { refresh: refresh.expose_secret().to_string() };
            if let Err(error) = self.client.post_unit("/api/auth/logout/", &payload).await {
                warn!(
                    event_name = "client.auth.logout_failed",
                    error_class = error.class(),
                    error = %error,
                    "server logout failed; clearing local session anyway"
                );
            }
        }
        session.teardown();
    }
}
