use std::collections::BTreeMap;

use thiserror::Error;

use crate::lifecycle::LifecycleError;
use crate::validation::ValidationErrors;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failures surfaced by every repository operation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("authentication required: {message}")]
    Auth { message: String },
    #[error("not permitted: {message}")]
    Forbidden { message: String },
    #[error("validation failed: {message}")]
    Validation { message: String, fields: BTreeMap<String, Vec<String>> },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("network failure: {0}")]
    Network(String),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("control `{control}` is not available for this request")]
    ControlUnavailable { control: &'static str },
    #[error("`{control}` is already in flight")]
    InFlight { control: &'static str },
}

/// How the initiating view should report a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Feedback {
    ForceLogout,
    InlineFields,
    NotFound,
    RetryToast,
    FailureToast,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), fields: BTreeMap::new() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden { message: message.into() }
    }

    /// Error class used in structured command output and logs.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::Forbidden { .. } => "forbidden",
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Network(_) => "network",
            Self::Server { .. } => "server",
            Self::Decode(_) => "decode",
            Self::ControlUnavailable { .. } => "control_unavailable",
            Self::InFlight { .. } => "in_flight",
        }
    }

    /// Only reads retry, and only on these.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }

    pub fn feedback(&self) -> Feedback {
        match self {
            Self::Auth { .. } => Feedback::ForceLogout,
            Self::Validation { .. } => Feedback::InlineFields,
            Self::NotFound { .. } => Feedback::NotFound,
            Self::Network(_) => Feedback::RetryToast,
            Self::Forbidden { .. }
            | Self::Server { .. }
            | Self::Decode(_)
            | Self::ControlUnavailable { .. }
            | Self::InFlight { .. } => Feedback::FailureToast,
        }
    }

    pub fn field_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match self {
            Self::Validation { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Server-provided text where there is one, a generic message otherwise.
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth { .. } => "Your session has expired. Please log in again.".to_string(),
            Self::Forbidden { message }
            | Self::Validation { message, .. }
            | Self::NotFound { message } => message.clone(),
            Self::Network(_) => "The server could not be reached. Please retry.".to_string(),
            Self::Server { .. } | Self::Decode(_) => {
                "Something went wrong on the server. Please try again later.".to_string()
            }
            Self::ControlUnavailable { control } => {
                format!("`{control}` is not available for this request.")
            }
            Self::InFlight { control } => format!("`{control}` is already in progress."),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation { message: errors.summary(), fields: errors.by_field() }
    }
}

/// Status-code mapping of a rejected transition, as the server reports it.
impl From<LifecycleError> for ApiError {
    fn from(error: LifecycleError) -> Self {
        match error {
            LifecycleError::NotAuthorized { .. } | LifecycleError::NotOwner { .. } => {
                Self::forbidden(error.to_string())
            }
            LifecycleError::InvalidTransition { .. } | LifecycleError::NotEditable { .. } => {
                Self::validation(error.to_string())
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Lifecycle(error) => error.into(),
            DomainError::Validation(errors) => errors.into(),
            DomainError::InvariantViolation(message) => Self::validation(message),
        }
    }
}
