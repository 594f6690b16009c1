//! OpenAPI documentation configuration

use utoipa::OpenApi;

/// Combined OpenAPI documentation for all APIs
#[derive(OpenApi)]
#[openapi(
    info(
        title = "User API",
        version = "0.1.0",
        description = "MongoDB-backed REST API for managing users",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    paths(crate::api::root),
    components(schemas(axum_helpers::MessageResponse, axum_helpers::ResponseStatus)),
    nest(
        (path = "/users", api = domain_users::ApiDoc)
    ),
    tags(
        (name = "Users", description = "User management endpoints (MongoDB)"),
        (name = "Service", description = "Service status")
    )
)]
pub struct ApiDoc;
