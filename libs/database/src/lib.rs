//! Database library providing MongoDB connection management
//!
//! # Features
//!
//! - `mongodb` (default) - MongoDB support
//! - `config` - Configuration support with `core_config::FromEnv`
//! - `all` - All features
//!
//! # Example
//!
//! ```ignore
//! use database::mongodb;
//!
//! let client = mongodb::connect("mongodb://localhost:27017").await?;
//! let db = client.database("user_db");
//! let users = db.collection::<Document>("users");
//! ```

#[cfg(feature = "mongodb")]
pub mod mongodb;
