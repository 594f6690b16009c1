use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use std::sync::Arc;
use tracing::instrument;
use validator::Validate;

use crate::error::{UserError, UserResult};
use crate::models::{CreateUser, DeleteResponse, NewUser, UpdateUser, UserChanges, UserResponse};
use crate::repository::UserRepository;

/// Service layer for User business logic
#[derive(Clone)]
pub struct UserService<R: UserRepository> {
    repository: Arc<R>,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    /// Validate, hash the password, and insert
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_user(&self, input: CreateUser) -> UserResult<UserResponse> {
        input.validate()?;

        let password_hash = hash_password(&input.password)?;
        let user = NewUser::new(input.name, input.email, password_hash);

        let created = self.repository.create(user).await?;
        Ok(created.into())
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self) -> UserResult<Vec<UserResponse>> {
        let users = self.repository.list().await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: &str) -> UserResult<UserResponse> {
        let object_id = parse_user_id(id)?;

        let user = self
            .repository
            .get_by_id(object_id)
            .await?
            .ok_or_else(|| UserError::NotFound(id.to_string()))?;

        Ok(user.into())
    }

    /// Partial update followed by a re-read of the stored record
    #[instrument(skip(self, input))]
    pub async fn update_user(&self, id: &str, input: UpdateUser) -> UserResult<UserResponse> {
        let object_id = parse_user_id(id)?;
        input.validate()?;

        let password_hash = input
            .password
            .as_deref()
            .map(hash_password)
            .transpose()?;

        let changes = UserChanges {
            name: input.name,
            email: input.email,
            password_hash,
            updated_at: Utc::now(),
        };

        if !self.repository.update(object_id, changes).await? {
            return Err(UserError::NotFound(id.to_string()));
        }

        let user = self
            .repository
            .get_by_id(object_id)
            .await?
            .ok_or_else(|| UserError::NotFound(id.to_string()))?;

        Ok(user.into())
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: &str) -> UserResult<DeleteResponse> {
        let object_id = parse_user_id(id)?;

        if !self.repository.delete(object_id).await? {
            return Err(UserError::NotFound(id.to_string()));
        }

        Ok(DeleteResponse::for_id(id))
    }
}

/// Malformed ids can never match a record, so they are reported as not found.
fn parse_user_id(id: &str) -> UserResult<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| UserError::NotFound(id.to_string()))
}

fn hash_password(password: &str) -> UserResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserError::PasswordHash(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::repository::MockUserRepository;
    use argon2::{PasswordHash, PasswordVerifier};
    use mockall::predicate::eq;

    fn stored_user(id: ObjectId, name: &str, email: &str) -> User {
        NewUser::new(name.to_string(), email.to_string(), "hash".to_string()).into_user(id)
    }

    fn create_input(email: &str) -> CreateUser {
        CreateUser {
            name: "A".to_string(),
            email: email.to_string(),
            password: "p".to_string(),
        }
    }

    #[test]
    fn test_hash_password_is_verifiable_and_salted() {
        let first = hash_password("secret").unwrap();
        let second = hash_password("secret").unwrap();

        assert_ne!(first, "secret");
        assert_ne!(first, second);
        assert!(first.starts_with("$argon2"));

        let parsed = PasswordHash::new(&first).unwrap();
        assert!(
            Argon2::default()
                .verify_password(b"secret", &parsed)
                .is_ok()
        );
    }

    #[test]
    fn test_parse_user_id() {
        let id = ObjectId::new();
        assert_eq!(parse_user_id(&id.to_hex()).unwrap(), id);
        assert!(matches!(
            parse_user_id("not-an-id"),
            Err(UserError::NotFound(ref s)) if s == "not-an-id"
        ));
    }

    #[tokio::test]
    async fn test_create_user_hashes_password_before_insert() {
        let mut mock_repo = MockUserRepository::new();

        mock_repo
            .expect_create()
            .withf(|user| user.email == "a@x.io" && user.password_hash.starts_with("$argon2"))
            .times(1)
            .returning(|user| Ok(user.into_user(ObjectId::new())));

        let service = UserService::new(mock_repo);
        let created = service.create_user(create_input("a@x.io")).await.unwrap();

        assert_eq!(created.email, "a@x.io");
        assert_eq!(created.id.len(), 24);
    }

    #[tokio::test]
    async fn test_create_user_invalid_email_never_reaches_store() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo.expect_create().never();

        let service = UserService::new(mock_repo);
        let result = service.create_user(create_input("nope")).await;

        assert!(matches!(result, Err(UserError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_user_propagates_duplicate() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_create()
            .returning(|user| Err(UserError::DuplicateEmail(user.email)));

        let service = UserService::new(mock_repo);
        let result = service.create_user(create_input("a@x.io")).await;

        assert!(matches!(result, Err(UserError::DuplicateEmail(ref e)) if e == "a@x.io"));
    }

    #[tokio::test]
    async fn test_get_user_malformed_id_is_not_found() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo.expect_get_by_id().never();

        let service = UserService::new(mock_repo);
        let result = service.get_user("123").await;

        assert!(matches!(result, Err(UserError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_user_absent_is_not_found() {
        let mut mock_repo = MockUserRepository::new();
        let id = ObjectId::new();

        mock_repo
            .expect_get_by_id()
            .with(eq(id))
            .returning(|_| Ok(None));

        let service = UserService::new(mock_repo);
        let result = service.get_user(&id.to_hex()).await;

        assert!(matches!(result, Err(UserError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_users_surfaces_database_error() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_list()
            .returning(|| Err(UserError::Database("connection reset".to_string())));

        let service = UserService::new(mock_repo);
        let result = service.list_users().await;

        assert!(matches!(result, Err(UserError::Database(_))));
    }

    #[tokio::test]
    async fn test_update_user_sends_only_supplied_fields() {
        let mut mock_repo = MockUserRepository::new();
        let id = ObjectId::new();

        mock_repo
            .expect_update()
            .withf(move |target, changes| {
                *target == id
                    && changes.name.as_deref() == Some("B")
                    && changes.email.is_none()
                    && changes.password_hash.is_none()
            })
            .times(1)
            .returning(|_, _| Ok(true));
        mock_repo
            .expect_get_by_id()
            .with(eq(id))
            .returning(move |_| Ok(Some(stored_user(id, "B", "a@x.io"))));

        let service = UserService::new(mock_repo);
        let update = UpdateUser {
            name: Some("B".to_string()),
            ..Default::default()
        };
        let updated = service.update_user(&id.to_hex(), update).await.unwrap();

        assert_eq!(updated.name, "B");
        assert_eq!(updated.email, "a@x.io");
    }

    #[tokio::test]
    async fn test_update_user_rehashes_new_password() {
        let mut mock_repo = MockUserRepository::new();
        let id = ObjectId::new();

        mock_repo
            .expect_update()
            .withf(|_, changes| {
                changes
                    .password_hash
                    .as_deref()
                    .is_some_and(|h| h.starts_with("$argon2") && h != "new-secret")
            })
            .returning(|_, _| Ok(true));
        mock_repo
            .expect_get_by_id()
            .returning(move |_| Ok(Some(stored_user(id, "A", "a@x.io"))));

        let service = UserService::new(mock_repo);
        let update = UpdateUser {
            password: Some("new-secret".to_string()),
            ..Default::default()
        };

        assert!(service.update_user(&id.to_hex(), update).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_user_no_match_is_not_found() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo.expect_update().returning(|_, _| Ok(false));
        mock_repo.expect_get_by_id().never();

        let service = UserService::new(mock_repo);
        let result = service
            .update_user(&ObjectId::new().to_hex(), UpdateUser::default())
            .await;

        assert!(matches!(result, Err(UserError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_user_deleted_before_reread_is_not_found() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo.expect_update().returning(|_, _| Ok(true));
        mock_repo.expect_get_by_id().returning(|_| Ok(None));

        let service = UserService::new(mock_repo);
        let result = service
            .update_user(&ObjectId::new().to_hex(), UpdateUser::default())
            .await;

        assert!(matches!(result, Err(UserError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_user_duplicate_email() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_update()
            .returning(|_, changes| Err(UserError::DuplicateEmail(changes.email.unwrap_or_default())));

        let service = UserService::new(mock_repo);
        let update = UpdateUser {
            email: Some("taken@x.io".to_string()),
            ..Default::default()
        };
        let result = service.update_user(&ObjectId::new().to_hex(), update).await;

        assert!(matches!(result, Err(UserError::DuplicateEmail(ref e)) if e == "taken@x.io"));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let mut mock_repo = MockUserRepository::new();
        let id = ObjectId::new();
        mock_repo
            .expect_delete()
            .with(eq(id))
            .times(1)
            .returning(|_| Ok(true));

        let service = UserService::new(mock_repo);
        let response = service.delete_user(&id.to_hex()).await.unwrap();

        assert_eq!(response.message, format!("User with ID {} deleted", id.to_hex()));
    }

    #[tokio::test]
    async fn test_delete_user_no_match_is_not_found() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo.expect_delete().returning(|_| Ok(false));

        let service = UserService::new(mock_repo);
        let result = service.delete_user(&ObjectId::new().to_hex()).await;

        assert!(matches!(result, Err(UserError::NotFound(_))));
    }
}
