use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::ALLOW},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::validation::ValidationFailure;

pub type Result<T> = std::result::Result<T, DispatchError>;

/// Startup failures. Any of these prevents the application from serving.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("The `{key}` setting is empty or undefined")]
    MissingConfig { key: String },

    #[error("No controller found in the specified namespace: {namespace}")]
    NoControllers { namespace: String },

    #[error(
        "The method {method} in {controller} has returned an invalid type. Returned type: {returned}"
    )]
    InvalidReturnType {
        controller: String,
        method: String,
        returned: String,
    },

    #[error("Verb action {field} can't be empty")]
    EmptyVerbAction { field: &'static str },

    #[error("{verb} {url} is already bound to {existing}, cannot also bind it to {incoming}")]
    ConflictingVerb {
        url: String,
        verb: String,
        existing: String,
        incoming: String,
    },

    #[error("{url} is already served by {existing}, cannot also map it to {incoming}")]
    ConflictingController {
        url: String,
        existing: String,
        incoming: String,
    },
}

/// A single parameter that could not be bound from request data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("Invalid value for type {type_name}: {value}")]
    InvalidValue { type_name: String, value: String },

    #[error("Cannot convert empty value to type {type_name}")]
    EmptyValue { type_name: String },

    #[error("Parameter `{parameter}` is not annotated properly")]
    NotAnnotated { parameter: String },

    #[error("Required file part `{name}` is missing")]
    MissingPart { name: String },

    #[error("Argument for parameter `{parameter}` does not match its declared binding")]
    ArgumentMismatch { parameter: String },
}

impl BindingError {
    pub fn invalid(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            type_name: type_name.into(),
            value: value.into(),
        }
    }
}

/// Every binding error collected while resolving one handler call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct BindingErrors(pub Vec<BindingError>);

impl BindingErrors {
    pub fn errors(&self) -> &[BindingError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BindingErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&messages.join("; "))
    }
}

impl From<BindingError> for BindingErrors {
    fn from(error: BindingError) -> Self {
        Self(vec![error])
    }
}

/// Per-request failures produced by the dispatch pipeline.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("404 NOT FOUND: specified URL not found : {url}")]
    RouteNotFound { url: String },

    #[error("{verb} method is not allowed for the URL: {url}")]
    MethodNotAllowed {
        verb: String,
        url: String,
        allowed: Vec<String>,
    },

    #[error(transparent)]
    Binding(#[from] BindingErrors),

    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            DispatchError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            DispatchError::Binding(_)
            | DispatchError::Validation(_)
            | DispatchError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            DispatchError::IllegalState(_) | DispatchError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<BindingError> for DispatchError {
    fn from(error: BindingError) -> Self {
        DispatchError::Binding(error.into())
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(err: anyhow::Error) -> Self {
        DispatchError::Internal(format!("{err:#}"))
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status();

        if let DispatchError::Validation(failure) = &self {
            return (status, Json(failure.to_json())).into_response();
        }

        let message = match &self {
            // Details stay in the logs.
            DispatchError::IllegalState(_) | DispatchError::Internal(_) => {
                "Internal Server Error".to_string()
            }
            _ => self.to_string(),
        };

        let mut response = (
            status,
            Json(json!({
                "statusCode": status.as_u16(),
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            })),
        )
            .into_response();

        if let DispatchError::MethodNotAllowed { allowed, .. } = &self {
            if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                response.headers_mut().insert(ALLOW, value);
            }
        }
        response
    }
}
