//! Outbound responses

use crate::core::document::MEDIA_TYPE;
use crate::core::error::ApiError;
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

/// Successful controller response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Option<Value>,
    pub location: Option<String>,
}

impl ApiResponse {
    /// 200 with a document body
    pub fn ok<T: Serialize>(body: &T) -> Result<Self, ApiError> {
        Ok(Self {
            status: StatusCode::OK,
            body: Some(serde_json::to_value(body)?),
            location: None,
        })
    }

    /// 201 with a document body and a `Location` header
    pub fn created<T: Serialize>(body: &T, location: impl Into<String>) -> Result<Self, ApiError> {
        Ok(Self {
            status: StatusCode::CREATED,
            body: Some(serde_json::to_value(body)?),
            location: Some(location.into()),
        })
    }

    /// 204 without a body
    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: None,
            location: None,
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let ApiResponse {
            status,
            body,
            location,
        } = self;

        let mut response = match body {
            Some(body) => document_response(status, &body),
            None => status.into_response(),
        };

        if let Some(location) = location
            && let Ok(value) = HeaderValue::from_str(&location)
        {
            response.headers_mut().insert(LOCATION, value);
        }

        response
    }
}

/// Serialize a document with the JSON:API media type
pub(crate) fn document_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (status, [(CONTENT_TYPE, MEDIA_TYPE)], bytes).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize response document");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
