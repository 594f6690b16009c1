pub mod codes;
pub mod handlers;
pub mod responses;

pub use codes::ErrorCode;

use crate::envelope::ResponseStatus;
use axum::{
    Json,
    extract::rejection::JsonRejection,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

/// Standard error response structure.
///
/// Returned for every failed request:
/// - `status`: always `"error"`
/// - `message`: human-readable error message
/// - `code`: machine-readable error identifier (e.g., "NOT_FOUND")
/// - `details`: optional structured details (e.g., per-field validation errors)
///
/// # JSON Example
///
/// ```json
/// {
///   "status": "error",
///   "message": "User not found: 65f1c0ffee",
///   "code": "NOT_FOUND"
/// }
/// ```
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub status: ResponseStatus,
    pub message: String,
    pub code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: message.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

/// Application error type that can be converted to HTTP responses.
///
/// Domain crates convert their own error enums into this type; the
/// [`IntoResponse`] impl renders the error envelope and logs the failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    #[error("JSON extraction error: {0}")]
    JsonExtractorRejection(#[from] JsonRejection),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationErrors),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Duplicate resource: {0}")]
    DuplicateResource(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal Server Error: {0}")]
    InternalServerError(String),
}

impl AppError {
    /// Error code this variant renders with.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::JsonExtractorRejection(_) => ErrorCode::InvalidJson,
            AppError::ValidationError(_) | AppError::Validation(_) => ErrorCode::ValidationError,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::DuplicateResource(_) => ErrorCode::DuplicateResource,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::InternalServerError(_) => ErrorCode::InternalError,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.error_code();

        if code.status().is_server_error() {
            tracing::error!(error_code = code.code(), "{}", self);
        } else {
            tracing::info!(error_code = code.code(), "{}", self);
        }

        let body = match self {
            AppError::JsonExtractorRejection(e) => ErrorResponse::new(code, e.body_text()),
            AppError::ValidationError(e) => ErrorResponse::new(code, code.default_message())
                .with_details(validation_details(&e)),
            AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::DuplicateResource(msg)
            | AppError::Database(msg)
            | AppError::InternalServerError(msg) => ErrorResponse::new(code, msg),
        };

        body.into_response()
    }
}

/// Flattens validator errors into `{ field: [{code, message, params}] }`.
pub fn validation_details(errors: &ValidationErrors) -> serde_json::Value {
    let details = errors
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let error_messages: Vec<serde_json::Value> = errors
                .iter()
                .map(|err| {
                    serde_json::json!({
                        "code": err.code,
                        "message": err.message,
                        "params": err.params,
                    })
                })
                .collect();
            (field.to_string(), serde_json::json!(error_messages))
        })
        .collect::<serde_json::Map<_, _>>();

    serde_json::Value::Object(details)
}

/// Helper function to create error responses.
///
/// # Example
///
/// ```rust,ignore
/// use axum_helpers::errors::{error_response, ErrorCode};
///
/// let response = error_response(ErrorCode::NotFound, "No such route");
/// ```
pub fn error_response(code: ErrorCode, message: impl Into<String>) -> Response {
    ErrorResponse::new(code, message).into_response()
}
