use axum::response::Response;

use super::{ErrorCode, error_response};

/// Fallback handler rendering a 404 error envelope.
pub async fn not_found() -> Response {
    error_response(ErrorCode::NotFound, "The requested resource was not found")
}

/// Fallback for routes that exist but do not accept the request method.
pub async fn method_not_allowed() -> Response {
    error_response(
        ErrorCode::MethodNotAllowed,
        ErrorCode::MethodNotAllowed.default_message(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_not_found_fallback_status() {
        let response = not_found().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_method_not_allowed_fallback_status() {
        let response = method_not_allowed().await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
