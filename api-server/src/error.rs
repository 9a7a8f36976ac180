//! HTTP-facing error type shared by all handlers.

use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors a handler can surface to the caller.
#[derive(Debug, Error, PartialEq)]
pub enum ApiError {
    /// Wrong HTTP verb.
    #[error("Method Not Allowed")]
    MethodNotAllowed,

    /// Missing or malformed input, or a failed CAPTCHA check.
    #[error("{0}")]
    Validation(String),

    /// Webhook signature could not be verified.
    #[error("Webhook Error: {0}")]
    Verification(String),

    /// Email or billing provider failure.
    #[error("{0}")]
    Delivery(String),
}

/// JSON error body: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Validation(_) | ApiError::Verification(_) => StatusCode::BAD_REQUEST,
            ApiError::Delivery(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });

        match self {
            ApiError::MethodNotAllowed => (
                status,
                [(header::ALLOW, HeaderValue::from_static("POST"))],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

/// Fallback for every non-POST method on the API routes.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::MethodNotAllowed.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Verification("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Delivery("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_method_not_allowed_sets_allow_header() {
        let response = ApiError::MethodNotAllowed.into_response();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "POST");
    }

    #[test]
    fn test_verification_message_prefixed() {
        let err = ApiError::Verification("bad signature".to_string());
        assert_eq!(err.to_string(), "Webhook Error: bad signature");
    }
}
