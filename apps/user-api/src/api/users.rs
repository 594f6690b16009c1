//! Users API routes
//!
//! Wires the users domain to the MongoDB database held in the app state.

use axum::Router;
use domain_users::{MongoUserRepository, UserService, handlers};

use crate::state::AppState;

/// Create users router
pub fn router(state: &AppState) -> Router {
    let repository = MongoUserRepository::new(&state.db);
    let service = UserService::new(repository);

    handlers::router(service)
}

/// Create the unique email index before serving traffic
pub async fn init_indexes(db: &mongodb::Database) -> eyre::Result<()> {
    use domain_users::UserRepository;

    MongoUserRepository::new(db)
        .ensure_indexes()
        .await
        .map_err(|e| eyre::eyre!("Failed to create user indexes: {}", e))?;
    tracing::info!("User collection indexes created");
    Ok(())
}
