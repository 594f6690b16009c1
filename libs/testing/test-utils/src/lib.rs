//! Shared test utilities for domain testing
//!
//! - `TestMongo`: MongoDB container with automatic cleanup (feature: "mongo")
//! - `TestDataBuilder`: Deterministic test data generation (always available)
//! - `assertions`: Custom assertion helpers (always available)
//!
//! # Usage
//!
//! Add `features = ["mongo"]` to your dev-dependencies:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { workspace = true, features = ["mongo"] }
//! ```
//!
//! ```rust,ignore
//! use test_utils::{TestDataBuilder, TestMongo};
//!
//! #[tokio::test]
//! async fn my_mongo_test() {
//!     let mongo = TestMongo::new().await;
//!     let db = mongo.database("my_test");
//!     let builder = TestDataBuilder::from_test_name("my_mongo_test");
//!
//!     let email = builder.email("main");
//! }
//! ```

#[cfg(feature = "mongo")]
mod mongo;

#[cfg(feature = "mongo")]
pub use mongo::TestMongo;

/// Builder for test data with deterministic randomization
///
/// This ensures tests are reproducible by using seeded random data.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// This is the recommended way to create a builder for consistent test data.
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_create_resource");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Generate a unique email address for testing
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("my_test");
    /// assert!(builder.email("alice").starts_with("test-alice-"));
    /// ```
    pub fn email(&self, local: &str) -> String {
        format!("test-{}-{}@example.com", local, self.seed)
    }

    /// Generate a unique database name, safe for MongoDB (no dots, < 64 bytes)
    pub fn database_name(&self) -> String {
        format!("test_{}", self.seed)
    }
}

/// Test assertion helpers
pub mod assertions {
    /// Assert that a JSON object does not expose any of `keys`
    pub fn assert_no_keys(value: &str, keys: &[&str], context: &str) {
        for key in keys {
            assert!(
                !value.contains(&format!("\"{}\"", key)),
                "{}: unexpected key {:?} in {}",
                context,
                key,
                value
            );
        }
    }
}
