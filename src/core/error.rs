//! Typed error handling for resource requests
//!
//! Every failure surfaced to a client falls into one of two classes:
//!
//! - [`ApiError::Plain`]: a user-facing error whose message is returned
//!   verbatim together with an explicit status code.
//! - [`ApiError::Fatal`]: an infrastructure or configuration failure. The
//!   cause is logged and the client only sees a bare 500.
//!
//! Build-time problems are reported with [`ConfigError`] and backend failures
//! with [`StorageError`]; the latter always become fatal request errors.
//!
//! # Example
//!
//! ```rust,ignore
//! use jsonapi::prelude::*;
//!
//! fn parse_title(value: &str) -> Result<String, ApiError> {
//!     if value.is_empty() {
//!         return Err(ApiError::bad_request("title must not be empty"));
//!     }
//!     Ok(value.to_string())
//! }
//! ```

use crate::server::response::document_response;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Error type returned by controllers and the group dispatcher
#[derive(Debug)]
pub enum ApiError {
    /// User-facing error, rendered with its status and message
    Plain { status: StatusCode, message: String },

    /// Internal failure; logged and hidden from the caller
    Fatal(anyhow::Error),
}

impl ApiError {
    /// Create a plain error with an explicit status
    pub fn plain(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Plain {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::plain(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::plain(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::plain(StatusCode::NOT_FOUND, message)
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::plain(StatusCode::METHOD_NOT_ALLOWED, message)
    }

    /// Wrap an internal failure
    pub fn fatal(cause: impl Into<anyhow::Error>) -> Self {
        ApiError::Fatal(cause.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Plain { status, .. } => *status,
            ApiError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::Fatal(_))
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == StatusCode::NOT_FOUND
    }

    /// Convert to the error object sent to clients
    ///
    /// Fatal errors never expose their cause.
    pub fn to_error_object(&self) -> ErrorObject {
        let status = self.status_code();
        ErrorObject {
            status: status.as_u16().to_string(),
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            detail: match self {
                ApiError::Plain { message, .. } => Some(message.clone()),
                ApiError::Fatal(_) => None,
            },
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Plain { message, .. } => write!(f, "{}", message),
            ApiError::Fatal(cause) => write!(f, "Internal error: {}", cause),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Plain { .. } => None,
            ApiError::Fatal(cause) => Some(cause.as_ref()),
        }
    }
}

/// A single entry of the `errors` array
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorObject {
    /// Status code as a string
    pub status: String,
    /// Canonical reason phrase of the status
    pub title: String,
    /// Message of a plain error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Top-level error document
#[derive(Debug, Serialize)]
pub struct ErrorDocument {
    pub errors: Vec<ErrorObject>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Fatal(cause) = &self {
            tracing::error!(error = ?cause, "fatal error while handling request");
        }

        let status = self.status_code();
        let body = ErrorDocument {
            errors: vec![self.to_error_object()],
        };
        document_response(status, &body)
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Fatal(err.into())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Fatal(err.into())
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors detected while assembling a group or loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("resource '{0}' is registered more than once")]
    DuplicateResource(String),

    #[error("resource '{resource}' declares field '{field}' more than once")]
    DuplicateField { resource: String, field: String },

    #[error("relationship '{resource}.{field}' targets unregistered resource '{target}'")]
    MissingResource {
        resource: String,
        field: String,
        target: String,
    },

    #[error(
        "has-many relationship '{resource}.{field}' expects a to-one or to-many relationship '{inverse}' on '{target}'"
    )]
    MissingInverse {
        resource: String,
        field: String,
        target: String,
        inverse: String,
    },

    #[error("controller for '{0}' is already attached to a group")]
    AlreadyAttached(String),

    #[error("failed to load configuration: {0}")]
    Load(String),
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors raised by store backends
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("document '{id}' already exists in '{collection}'")]
    Duplicate { collection: String, id: String },

    #[error("failed to acquire storage lock: {0}")]
    Poisoned(String),

    #[error("session pool is closed")]
    PoolClosed,

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("{backend} error: {message}")]
    Backend { backend: String, message: String },
}
