use axum_helpers::server::{create_production_app, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use std::time::Duration;
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output
    install_color_eyre();

    // Load configuration from environment variables
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.environment);

    info!("Connecting to MongoDB at {}", config.mongodb.redacted_url());

    let mongo_client = database::mongodb::connect_from_config(&config.mongodb).await?;
    let db = mongo_client.database(config.mongodb.database());

    info!(
        "Successfully connected to MongoDB database: {}",
        config.mongodb.database()
    );

    api::users::init_indexes(&db).await?;

    let state = AppState {
        config,
        mongo_client,
        db,
    };

    // API routes plus the liveness endpoint
    let api_routes = api::routes(&state).merge(health_router(state.config.app));

    // Create a router with OpenAPI docs and error-envelope fallbacks
    let app = axum_helpers::create_router::<openapi::ApiDoc>(api_routes);

    let server_config = state.config.server.clone();
    let mongo_client = state.mongo_client.clone();

    info!("Starting User API with production-ready shutdown (30s timeout)");

    create_production_app(
        app,
        &server_config,
        Duration::from_secs(30),
        async move {
            info!("Shutting down: closing MongoDB connections");
            mongo_client.shutdown().await;
            info!("MongoDB connection closed successfully");
        },
    )
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("User API shutdown complete");
    Ok(())
}
