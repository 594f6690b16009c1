#[cfg(feature = "config")]
use core_config::{env_parse_or, ConfigError, FromEnv};

/// Database name used when none is configured.
pub const DEFAULT_DATABASE: &str = "user_db";

/// MongoDB connection settings.
///
/// Constructed by hand or loaded from the environment (with the `config` feature).
///
/// # Example
///
/// ```ignore
/// use database::mongodb::MongoConfig;
///
/// let config = MongoConfig::with_database("mongodb://localhost:27017", "user_db");
/// let config = MongoConfig::from_env()?;
/// ```
#[derive(Clone, Debug)]
pub struct MongoConfig {
    /// Connection string.
    /// Format: mongodb://[username:password@]host[:port][/database][?options]
    pub url: String,

    /// Database name to use
    pub database: String,

    /// Optional application name reported in server logs
    pub app_name: Option<String>,

    pub max_pool_size: u32,
    pub min_pool_size: u32,

    /// Socket connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Upper bound for the startup liveness check, in seconds
    pub server_selection_timeout_secs: u64,
}

impl MongoConfig {
    /// Create a config for `url` using [`DEFAULT_DATABASE`].
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_database(url, DEFAULT_DATABASE)
    }

    /// Create a config for `url` with an explicit database name.
    pub fn with_database(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            app_name: None,
            max_pool_size: 100,
            min_pool_size: 5,
            connect_timeout_secs: 10,
            server_selection_timeout_secs: 30,
        }
    }

    /// Set the application name for server logs
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    /// Override the liveness-check bound
    pub fn with_server_selection_timeout(mut self, secs: u64) -> Self {
        self.server_selection_timeout_secs = secs;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Connection string with any password replaced, safe for logs.
    pub fn redacted_url(&self) -> String {
        let Some((scheme, rest)) = self.url.split_once("://") else {
            return self.url.clone();
        };
        match rest.split_once('@') {
            Some((credentials, host)) => {
                let user = credentials.split(':').next().unwrap_or_default();
                format!("{}://{}:****@{}", scheme, user, host)
            }
            None => self.url.clone(),
        }
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self::new("mongodb://localhost:27017")
    }
}

/// Load MongoConfig from environment variables
///
/// - `MONGO_URI` or `MONGODB_URL` (required) - connection string
/// - `MONGO_DATABASE` or `MONGODB_DATABASE` (optional, default: `user_db`)
/// - `MONGODB_APP_NAME` (optional)
/// - `MONGODB_MAX_POOL_SIZE` (optional, default: 100)
/// - `MONGODB_MIN_POOL_SIZE` (optional, default: 5)
/// - `MONGODB_CONNECT_TIMEOUT_SECS` (optional, default: 10)
/// - `MONGODB_SERVER_SELECTION_TIMEOUT_SECS` (optional, default: 30)
#[cfg(feature = "config")]
impl FromEnv for MongoConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("MONGO_URI")
            .or_else(|_| std::env::var("MONGODB_URL"))
            .map_err(|_| ConfigError::MissingEnvVar("MONGO_URI or MONGODB_URL".to_string()))?;

        let database = std::env::var("MONGO_DATABASE")
            .or_else(|_| std::env::var("MONGODB_DATABASE"))
            .unwrap_or_else(|_| DEFAULT_DATABASE.to_string());

        Ok(Self {
            url,
            database,
            app_name: std::env::var("MONGODB_APP_NAME").ok(),
            max_pool_size: env_parse_or("MONGODB_MAX_POOL_SIZE", 100)?,
            min_pool_size: env_parse_or("MONGODB_MIN_POOL_SIZE", 5)?,
            connect_timeout_secs: env_parse_or("MONGODB_CONNECT_TIMEOUT_SECS", 10)?,
            server_selection_timeout_secs: env_parse_or(
                "MONGODB_SERVER_SELECTION_TIMEOUT_SECS",
                30,
            )?,
        })
    }
}
