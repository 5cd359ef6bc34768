//! Request-level error taxonomy and the JSON error envelope.
//!
//! # Responsibilities
//! - Classify every dispatch, pipeline and handler failure
//! - Map each class to an HTTP status code
//! - Render the uniform `{ message, metadata?, code }` envelope
//!
//! # Design Decisions
//! - Handlers return `Result<Reply, RouteError>`; nothing is thrown
//! - Errors are converted to a response exactly once, at the request boundary
//! - Unexpected errors only expose their own display string

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

/// Message used when an internal error carries no text at all.
pub const FALLBACK_MESSAGE: &str = "Something bad happened. But no message was presented.";

/// A single field-level constraint violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// Location of the offending value, one entry per object key or array index.
    pub path: Vec<String>,
    /// Human-readable reason.
    pub message: String,
}

impl FieldViolation {
    pub fn new(path: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }

    /// Returns true if the violation points at `field` anywhere in its path.
    pub fn mentions(&self, field: &str) -> bool {
        self.path.iter().any(|p| p == field)
    }
}

/// Every way a request can fail.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouteError {
    /// No registered pattern matches the path.
    #[error("Cannot find endpoint")]
    NotFound,

    /// The path matched but the captures do not line up with the slugs.
    #[error("{0}")]
    BadRequest(String),

    /// The endpoint exists but serves neither this method nor a default.
    #[error("\"{method}\" is not allowed method. Available methods are {}", .available.join(", "))]
    MethodNotAllowed {
        method: String,
        available: Vec<String>,
    },

    /// Body or query failed the handler's declared constraints.
    #[error("Validation error occurred")]
    Validation { fields: Vec<FieldViolation> },

    /// Error raised deliberately by a handler or the pipeline.
    #[error("{message}")]
    Application {
        code: u16,
        message: String,
        metadata: Option<Value>,
    },

    /// Anything else.
    #[error("{0}")]
    Internal(String),
}

/// Wire form of an error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub code: u16,
}

impl RouteError {
    /// Application error with a status code and no metadata.
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        RouteError::Application {
            code,
            message: message.into(),
            metadata: None,
        }
    }

    /// Application error carrying structured metadata.
    pub fn with_metadata(code: u16, message: impl Into<String>, metadata: Value) -> Self {
        RouteError::Application {
            code,
            message: message.into(),
            metadata: Some(metadata),
        }
    }

    /// Wrap any displayable failure as an internal error.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        RouteError::Internal(err.to_string())
    }

    /// HTTP status code carried in the envelope.
    pub fn code(&self) -> u16 {
        match self {
            RouteError::NotFound => 404,
            RouteError::BadRequest(_) => 400,
            RouteError::MethodNotAllowed { .. } => 405,
            RouteError::Validation { .. } => 400,
            RouteError::Application { code, .. } => *code,
            RouteError::Internal(_) => 500,
        }
    }

    /// Status used on the wire. Out-of-range application codes become 500.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        let metadata = match self {
            RouteError::MethodNotAllowed { available, .. } => {
                Some(json!({ "available": available }))
            }
            RouteError::Validation { fields } => Some(json!({ "fields": fields })),
            RouteError::Application { metadata, .. } => metadata.clone(),
            _ => None,
        };

        let message = match self {
            RouteError::Internal(msg) if msg.trim().is_empty() => FALLBACK_MESSAGE.to_string(),
            other => other.to_string(),
        };

        ErrorEnvelope {
            message,
            metadata,
            code: self.status().as_u16(),
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.envelope())).into_response()
    }
}

impl From<anyhow::Error> for RouteError {
    fn from(err: anyhow::Error) -> Self {
        RouteError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for RouteError {
    fn from(err: serde_json::Error) -> Self {
        RouteError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for RouteError {
    fn from(err: std::io::Error) -> Self {
        RouteError::Internal(err.to_string())
    }
}
