//! # Axum Helpers
//!
//! Utilities for building Axum services with a uniform JSON envelope.
//!
//! ## Modules
//!
//! - **[`envelope`]**: `{status, data | message}` success wrappers
//! - **[`errors`]**: `AppError` and the error envelope with error codes
//! - **[`extractors`]**: `ValidatedJson`
//! - **[`http`]**: security headers middleware
//! - **[`server`]**: router setup, health checks, graceful shutdown
//!
//! ## Quick Start
//!
//! ```ignore
//! use axum::Router;
//! use axum_helpers::server::{create_production_app, create_router};
//! use core_config::server::ServerConfig;
//! use std::time::Duration;
//! use utoipa::OpenApi;
//!
//! #[derive(OpenApi)]
//! #[openapi(paths())]
//! struct ApiDoc;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let router = create_router::<ApiDoc>(Router::new());
//!     create_production_app(router, &ServerConfig::default(), Duration::from_secs(30), async {}).await
//! }
//! ```

pub mod envelope;
pub mod errors;
pub mod extractors;
pub mod http;
pub mod server;

pub use envelope::{ApiResponse, MessageResponse, ResponseStatus};

pub use server::{
    HealthCheckFuture, HealthResponse, ShutdownCoordinator, create_production_app,
    create_router, health_router, run_health_checks, shutdown_signal,
};

pub use http::security_headers;

pub use errors::{AppError, ErrorCode, ErrorResponse};

pub use extractors::ValidatedJson;
