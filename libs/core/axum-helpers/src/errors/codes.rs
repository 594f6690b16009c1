//! Type-safe error codes for API responses.
//!
//! Each error code carries:
//! - a SCREAMING_SNAKE_CASE identifier returned to clients (e.g., "VALIDATION_ERROR")
//! - an integer code used in structured logs (e.g., 1001)
//! - the HTTP status it maps to
//! - a default human-readable message
//!
//! # Example
//!
//! ```rust
//! use axum_helpers::errors::ErrorCode;
//!
//! let code = ErrorCode::ValidationError;
//! assert_eq!(code.as_str(), "VALIDATION_ERROR");
//! assert_eq!(code.code(), 1001);
//! assert_eq!(code.default_message(), "Request validation failed");
//! ```

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Standardized error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Client errors (1000-1999)
    /// Request validation failed
    ValidationError,

    /// Request body is not valid JSON for the target shape
    InvalidJson,

    /// Requested resource was not found
    NotFound,

    /// A unique field collides with an existing resource
    DuplicateResource,

    /// The route exists but does not accept the request method
    MethodNotAllowed,

    // Server errors
    /// An unexpected internal server error occurred
    InternalError,

    // Database errors (2000-2999)
    /// Store operation failed
    DatabaseError,
}

impl ErrorCode {
    /// Get the string representation for client consumption.
    ///
    /// ```rust
    /// use axum_helpers::errors::ErrorCode;
    ///
    /// assert_eq!(ErrorCode::NotFound.as_str(), "NOT_FOUND");
    /// ```
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InvalidJson => "INVALID_JSON",
            Self::NotFound => "NOT_FOUND",
            Self::DuplicateResource => "DUPLICATE_RESOURCE",
            Self::InternalError => "INTERNAL_ERROR",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::DatabaseError => "DATABASE_ERROR",
        }
    }

    /// Get the integer code for logging and monitoring.
    ///
    /// - 1000-1999: Client and generic server errors
    /// - 2000-2999: Database errors
    pub fn code(&self) -> i32 {
        match self {
            Self::ValidationError => 1001,
            Self::InvalidJson => 1003,
            Self::NotFound => 1004,
            Self::InternalError => 1005,
            Self::MethodNotAllowed => 1006,
            Self::DuplicateResource => 1008,

            Self::DatabaseError => 2003,
        }
    }

    /// HTTP status returned for this code.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ValidationError | Self::InvalidJson | Self::DuplicateResource => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::InternalError | Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the default user-facing error message.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::ValidationError => "Request validation failed",
            Self::InvalidJson => "Invalid JSON format",
            Self::NotFound => "Resource not found",
            Self::DuplicateResource => "Resource already exists",
            Self::InternalError => "An internal server error occurred",
            Self::MethodNotAllowed => "Method not allowed for this resource",
            Self::DatabaseError => "Database error occurred",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
