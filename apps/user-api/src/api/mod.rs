//! API routes module
//!
//! This module defines all HTTP API routes for the User API.

pub mod health;
pub mod users;

use axum::{Router, routing::get};
use axum_helpers::MessageResponse;

use crate::state::AppState;

/// Create all API routes
/// Note: mounted at the root by axum_helpers::create_router
pub fn routes(state: &AppState) -> Router {
    service_routes(users::router(state)).merge(health::router(state.clone()))
}

/// Banner at `/` with the users API nested under `/users`
fn service_routes(users: Router) -> Router {
    Router::new()
        .route("/", get(root))
        .nest("/users", users)
}

/// Service banner
#[utoipa::path(
    get,
    path = "/",
    tag = "Service",
    responses(
        (status = 200, description = "Service is running", body = MessageResponse)
    )
)]
pub async fn root() -> MessageResponse {
    MessageResponse::success("User API is running!")
}
