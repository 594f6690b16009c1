//! Reusable OpenAPI response types for consistent API documentation.

use super::ErrorResponse;
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToResponse;

#[derive(ToResponse)]
#[response(
    description = "Internal Server Error",
    content_type = "application/json",
    example = json!({
        "status": "error",
        "message": "An internal server error occurred",
        "code": "INTERNAL_ERROR"
    })
)]
pub struct InternalServerErrorResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Bad Request - Validation Error",
    content_type = "application/json",
    example = json!({
        "status": "error",
        "message": "Request validation failed",
        "code": "VALIDATION_ERROR",
        "details": {
            "email": [{
                "code": "email",
                "message": null,
                "params": {"value": "not-an-email"}
            }]
        }
    })
)]
pub struct BadRequestValidationResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Bad Request - Duplicate resource",
    content_type = "application/json",
    example = json!({
        "status": "error",
        "message": "Email already exists: a@x.io",
        "code": "DUPLICATE_RESOURCE"
    })
)]
pub struct DuplicateResourceResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Resource not found",
    content_type = "application/json",
    example = json!({
        "status": "error",
        "message": "Resource not found",
        "code": "NOT_FOUND"
    })
)]
pub struct NotFoundResponse(pub ErrorResponse);
