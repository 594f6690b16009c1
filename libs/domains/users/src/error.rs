use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum UserError {
    /// No record matched; also used for ids that are not valid ObjectIds
    #[error("User with ID {0} not found")]
    NotFound(String),

    #[error("User with email {0} already exists")]
    DuplicateEmail(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type UserResult<T> = Result<T, UserError>;

/// Convert UserError to AppError for standardized error responses
impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        let message = err.to_string();
        match err {
            UserError::NotFound(_) => AppError::NotFound(message),
            UserError::DuplicateEmail(_) => AppError::DuplicateResource(message),
            UserError::Validation(_) => AppError::Validation(message),
            UserError::Database(_) => AppError::Database(message),
            UserError::PasswordHash(_) | UserError::Internal(_) => {
                AppError::InternalServerError(message)
            }
        }
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

impl From<mongodb::error::Error> for UserError {
    fn from(err: mongodb::error::Error) -> Self {
        UserError::Database(err.to_string())
    }
}

impl From<ValidationErrors> for UserError {
    fn from(err: ValidationErrors) -> Self {
        UserError::Validation(err.to_string())
    }
}
