//! Users Domain
//!
//! CRUD for user records with email uniqueness and Argon2 password hashing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints, JSON envelope
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Service   │  ← Validation, password hashing, id parsing
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← Data access (trait + MongoDB and in-memory implementations)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Entity, inputs, responses
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_users::{handlers, MongoUserRepository, UserService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = database::mongodb::connect("mongodb://localhost:27017").await?;
//! let db = client.database("user_db");
//!
//! let repository = MongoUserRepository::new(&db);
//! let service = UserService::new(repository);
//!
//! let router = axum::Router::new().nest("/users", handlers::router(service));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod handlers;
pub mod models;
pub mod mongodb;
pub mod repository;
pub mod service;

pub use crate::mongodb::MongoUserRepository;
pub use error::{UserError, UserResult};
pub use handlers::ApiDoc;
pub use models::{CreateUser, DeleteResponse, UpdateUser, User, UserResponse};
pub use repository::{InMemoryUserRepository, UserRepository};
pub use service::UserService;
