use mongodb::{bson::doc, options::ClientOptions, Client};
use std::time::Duration;
use tracing::{error, info};

use super::MongoConfig;

/// Error type for MongoDB operations
#[derive(Debug, thiserror::Error)]
pub enum MongoError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

/// Connect to MongoDB with default pool and timeout settings.
///
/// See [`connect_from_config`].
pub async fn connect(url: &str) -> Result<Client, MongoError> {
    connect_from_config(&MongoConfig::new(url)).await
}

/// Connect using a [`MongoConfig`] and verify the server answers a `ping`.
///
/// A single attempt is made; server selection is bounded by
/// `server_selection_timeout_secs`. Callers are expected to treat an error as
/// fatal at startup.
///
/// # Example
/// ```ignore
/// use database::mongodb::{MongoConfig, connect_from_config};
///
/// let config = MongoConfig::with_database("mongodb://localhost:27017", "user_db");
/// let client = connect_from_config(&config).await?;
/// let db = client.database(config.database());
/// ```
pub async fn connect_from_config(config: &MongoConfig) -> Result<Client, MongoError> {
    info!(url = %config.redacted_url(), "Attempting to connect to MongoDB");

    let mut options = ClientOptions::parse(&config.url).await?;

    options.max_pool_size = Some(config.max_pool_size);
    options.min_pool_size = Some(config.min_pool_size);
    options.connect_timeout = Some(Duration::from_secs(config.connect_timeout_secs));
    options.server_selection_timeout =
        Some(Duration::from_secs(config.server_selection_timeout_secs));

    if let Some(ref app_name) = config.app_name {
        options.app_name = Some(app_name.clone());
    }

    let client = Client::with_options(options)?;

    if let Err(e) = client.database("admin").run_command(doc! { "ping": 1 }).await {
        error!(error = %e, "Failed to connect to MongoDB");
        return Err(MongoError::ConnectionFailed(e.to_string()));
    }

    info!("Connected to MongoDB");
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_malformed_url() {
        let result = connect("not-a-mongo-url").await;
        assert!(matches!(result, Err(MongoError::Mongo(_))));
    }

    #[tokio::test]
    async fn test_connect_fails_fast_when_unreachable() {
        let config = MongoConfig::new("mongodb://127.0.0.1:1/?connectTimeoutMS=200")
            .with_server_selection_timeout(1);
        let result = connect_from_config(&config).await;
        assert!(matches!(result, Err(MongoError::ConnectionFailed(_))));
    }

    #[tokio::test]
    #[ignore] // Requires actual MongoDB
    async fn test_connect_from_config() {
        let url = std::env::var("MONGO_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let config = MongoConfig::with_database(url, "test_user_db");
        assert!(connect_from_config(&config).await.is_ok());
    }
}
