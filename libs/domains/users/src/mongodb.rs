//! MongoDB implementation of UserRepository

use async_trait::async_trait;
use database::mongodb::is_duplicate_key;
use futures::TryStreamExt;
use mongodb::{
    Collection, Database, IndexModel,
    bson::{doc, oid::ObjectId, to_document},
    options::{FindOptions, IndexOptions},
};
use tracing::instrument;

use crate::error::{UserError, UserResult};
use crate::models::{NewUser, User, UserChanges};
use crate::repository::UserRepository;

pub const COLLECTION_NAME: &str = "users";

/// MongoDB implementation of the UserRepository
pub struct MongoUserRepository {
    collection: Collection<User>,
}

impl MongoUserRepository {
    /// Create a repository over the `users` collection of `db`
    ///
    /// # Example
    /// ```ignore
    /// let client = database::mongodb::connect("mongodb://localhost:27017").await?;
    /// let repo = MongoUserRepository::new(&client.database("user_db"));
    /// ```
    pub fn new(db: &Database) -> Self {
        Self::with_collection(db, COLLECTION_NAME)
    }

    pub fn with_collection(db: &Database, collection_name: &str) -> Self {
        Self {
            collection: db.collection::<User>(collection_name),
        }
    }

    pub fn collection(&self) -> &Collection<User> {
        &self.collection
    }

    /// Unique index on `email`, left with the server's default name `email_1`
    /// so an index created by an earlier deployment is reused.
    fn email_index() -> IndexModel {
        IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build()
    }

    /// Duplicate-key failures become DuplicateEmail, everything else a database error
    fn map_write_error(err: mongodb::error::Error, email: Option<&str>) -> UserError {
        if is_duplicate_key(&err) {
            UserError::DuplicateEmail(email.unwrap_or_default().to_string())
        } else {
            err.into()
        }
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn create(&self, user: NewUser) -> UserResult<User> {
        self.ensure_indexes().await?;

        let result = self
            .collection
            .clone_with_type::<NewUser>()
            .insert_one(&user)
            .await
            .map_err(|e| Self::map_write_error(e, Some(&user.email)))?;

        let id = result.inserted_id.as_object_id().ok_or_else(|| {
            UserError::Internal(format!(
                "insert returned a non-ObjectId id: {}",
                result.inserted_id
            ))
        })?;

        tracing::info!(user_id = %id, "User created successfully");
        Ok(user.into_user(id))
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: ObjectId) -> UserResult<Option<User>> {
        let user = self.collection.find_one(doc! { "_id": id }).await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn list(&self) -> UserResult<Vec<User>> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();

        let cursor = self
            .collection
            .find(doc! {})
            .with_options(options)
            .await?;
        let users: Vec<User> = cursor.try_collect().await?;
        Ok(users)
    }

    #[instrument(skip(self, changes))]
    async fn update(&self, id: ObjectId, changes: UserChanges) -> UserResult<bool> {
        let set = to_document(&changes).map_err(|e| UserError::Internal(e.to_string()))?;

        let result = self
            .collection
            .update_one(doc! { "_id": id }, doc! { "$set": set })
            .await
            .map_err(|e| Self::map_write_error(e, changes.email.as_deref()))?;

        if result.matched_count > 0 {
            tracing::info!(user_id = %id, "User updated successfully");
        }
        Ok(result.matched_count > 0)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: ObjectId) -> UserResult<bool> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;

        if result.deleted_count > 0 {
            tracing::info!(user_id = %id, "User deleted successfully");
        }
        Ok(result.deleted_count > 0)
    }

    #[instrument(skip(self))]
    async fn ensure_indexes(&self) -> UserResult<()> {
        self.collection.create_index(Self::email_index()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_email_index_is_unique() {
        let index = MongoUserRepository::email_index();
        assert_eq!(index.keys, doc! { "email": 1 });

        let options = index.options.unwrap();
        assert_eq!(options.unique, Some(true));
        assert!(options.name.is_none());
    }

    #[test]
    fn test_set_document_contains_only_present_fields() {
        let changes = UserChanges {
            name: Some("B".to_string()),
            email: None,
            password_hash: None,
            updated_at: Utc::now(),
        };
        let set = to_document(&changes).unwrap();

        assert_eq!(set.get_str("name").unwrap(), "B");
        assert!(set.contains_key("updated_at"));
        assert!(!set.contains_key("email"));
        assert!(!set.contains_key("password_hash"));
    }
}
