//! Uniform `{status, data | message}` wrappers for successful responses.
//!
//! Error responses use the same `status` field, see [`crate::errors::ErrorResponse`].

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Outcome marker carried by every response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Success envelope around a payload.
///
/// ```json
/// { "status": "success", "data": { ... } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub status: ResponseStatus,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: ResponseStatus::Success,
            data,
        }
    }

    /// Pair the envelope with a status code other than 200.
    pub fn with_status(self, status: StatusCode) -> (StatusCode, Json<Self>) {
        (status, Json(self))
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Success envelope carrying only a message.
///
/// ```json
/// { "status": "success", "message": "User API is running!" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub status: ResponseStatus,
    pub message: String,
}

impl MessageResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: message.into(),
        }
    }
}

impl IntoResponse for MessageResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_response_serializes_envelope() {
        let body = serde_json::to_value(ApiResponse::success(json!({"id": "abc"}))).unwrap();
        assert_eq!(body, json!({"status": "success", "data": {"id": "abc"}}));
    }

    #[test]
    fn test_message_response_serializes_envelope() {
        let body = serde_json::to_value(MessageResponse::success("ok")).unwrap();
        assert_eq!(body, json!({"status": "success", "message": "ok"}));
    }

    #[test]
    fn test_with_status_keeps_code() {
        let (status, _) = ApiResponse::success(1).with_status(StatusCode::CREATED);
        assert_eq!(status, StatusCode::CREATED);
    }

    #[test]
    fn test_response_status_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&ResponseStatus::Error).unwrap(),
            "\"error\""
        );
    }
}
