use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{UserError, UserResult};
use crate::models::{NewUser, User, UserChanges};

/// Repository trait for User persistence
///
/// Implementations must keep `email` unique across all users and report a
/// collision as [`UserError::DuplicateEmail`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; the store assigns the id
    async fn create(&self, user: NewUser) -> UserResult<User>;

    async fn get_by_id(&self, id: ObjectId) -> UserResult<Option<User>>;

    /// All users ordered by id
    async fn list(&self) -> UserResult<Vec<User>>;

    /// Apply a partial update. Returns false when no user matched `id`.
    async fn update(&self, id: ObjectId, changes: UserChanges) -> UserResult<bool>;

    /// Returns false when no user matched `id`.
    async fn delete(&self, id: ObjectId) -> UserResult<bool>;

    /// Idempotently create the indexes backing the uniqueness contract
    async fn ensure_indexes(&self) -> UserResult<()>;
}

/// In-memory implementation of UserRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<ObjectId, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: NewUser) -> UserResult<User> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == user.email) {
            return Err(UserError::DuplicateEmail(user.email));
        }

        let user = user.into_user(ObjectId::new());
        users.insert(user.id, user.clone());

        tracing::info!(user_id = %user.id, email = %user.email, "Created user");
        Ok(user)
    }

    async fn get_by_id(&self, id: ObjectId) -> UserResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn list(&self) -> UserResult<Vec<User>> {
        let users = self.users.read().await;

        let mut result: Vec<User> = users.values().cloned().collect();
        result.sort_by_key(|u| u.id);

        Ok(result)
    }

    async fn update(&self, id: ObjectId, changes: UserChanges) -> UserResult<bool> {
        let mut users = self.users.write().await;

        if !users.contains_key(&id) {
            return Ok(false);
        }

        if let Some(ref email) = changes.email {
            if users.values().any(|u| u.id != id && &u.email == email) {
                return Err(UserError::DuplicateEmail(email.clone()));
            }
        }

        if let Some(user) = users.get_mut(&id) {
            changes.apply_to(user);
        }

        tracing::info!(user_id = %id, "Updated user");
        Ok(true)
    }

    async fn delete(&self, id: ObjectId) -> UserResult<bool> {
        let mut users = self.users.write().await;

        if users.remove(&id).is_some() {
            tracing::info!(user_id = %id, "Deleted user");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn ensure_indexes(&self) -> UserResult<()> {
        Ok(())
    }
}
