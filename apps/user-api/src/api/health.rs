//! Readiness endpoint

use axum::{Router, extract::State, response::IntoResponse, routing::get};
use axum_helpers::{HealthCheckFuture, run_health_checks};
use database::mongodb::check_health_detailed;

use crate::state::AppState;

/// Create a readiness router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ready", get(readiness_check))
        .with_state(state)
}

/// Readiness check - verifies the MongoDB connection answers a ping
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let checks: Vec<(&str, HealthCheckFuture<'_>)> = vec![(
        "mongodb",
        Box::pin(async {
            let status = check_health_detailed(&state.mongo_client).await;
            tracing::debug!(
                healthy = status.healthy,
                response_time_ms = status.response_time_ms,
                "MongoDB ping"
            );
            if status.healthy {
                Ok(())
            } else {
                Err(status.message.unwrap_or_else(|| "ping failed".to_string()))
            }
        }),
    )];

    run_health_checks(checks).await
}
