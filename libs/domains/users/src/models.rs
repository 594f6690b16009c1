use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// User entity as stored in the `users` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string; never leaves the service
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user ready to insert; the store assigns `_id`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewUser {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            name,
            email,
            password_hash,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn into_user(self, id: ObjectId) -> User {
        User {
            id,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Fields written by a partial update. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl UserChanges {
    pub fn apply_to(&self, user: &mut User) {
        if let Some(ref name) = self.name {
            user.name = name.clone();
        }
        if let Some(ref email) = self.email {
            user.email = email.clone();
        }
        if let Some(ref password_hash) = self.password_hash {
            user.password_hash = password_hash.clone();
        }
        user.updated_at = self.updated_at;
    }
}

/// Payload for creating a user
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Ada Lovelace")]
    pub name: String,
    #[validate(email, length(max = 255))]
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Payload for a partial update; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email, length(max = 255))]
    pub email: Option<String>,
    #[validate(length(min = 1))]
    pub password: Option<String>,
}

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    /// 24-character hex ObjectId
    #[schema(example = "65f1c0ffee0000000000beef")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_hex(),
            name: user.name,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    #[schema(example = "User with ID 65f1c0ffee0000000000beef deleted")]
    pub message: String,
}

impl DeleteResponse {
    pub fn for_id(id: &str) -> Self {
        Self {
            message: format!("User with ID {} deleted", id),
        }
    }
}
