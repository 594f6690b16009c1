//! Application state management.
//!
//! The state is built once in `main` and handed to the route constructors.

use mongodb::{Client, Database};

/// Shared application state.
///
/// Cloning is cheap: the MongoDB handles share one connection pool.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded from environment variables
    pub config: crate::config::Config,
    /// MongoDB client (cloneable, shares underlying connection pool)
    pub mongo_client: Client,
    /// Database holding the `users` collection
    pub db: Database,
}
