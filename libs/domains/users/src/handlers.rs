use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use axum_helpers::{
    ApiResponse, ValidatedJson,
    errors::responses::{
        BadRequestValidationResponse, DuplicateResourceResponse, InternalServerErrorResponse,
        NotFoundResponse,
    },
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::UserResult;
use crate::models::{CreateUser, DeleteResponse, UpdateUser, UserResponse};
use crate::repository::UserRepository;
use crate::service::UserService;

/// OpenAPI documentation for Users API
#[derive(OpenApi)]
#[openapi(
    paths(list_users, create_user, get_user, update_user, delete_user),
    components(
        schemas(UserResponse, CreateUser, UpdateUser, DeleteResponse),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            DuplicateResourceResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = "Users", description = "User management endpoints")
    )
)]
pub struct ApiDoc;

/// Create the users router; mount it at `/users`
pub fn router<R: UserRepository + 'static>(service: UserService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .with_state(shared_service)
}

/// List all users
#[utoipa::path(
    get,
    path = "",
    tag = "Users",
    responses(
        (status = 200, description = "All users", body = ApiResponse<Vec<UserResponse>>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_users<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
) -> UserResult<ApiResponse<Vec<UserResponse>>> {
    let users = service.list_users().await?;
    Ok(ApiResponse::success(users))
}

/// Create a new user
#[utoipa::path(
    post,
    path = "",
    tag = "Users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = ApiResponse<UserResponse>),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    ValidatedJson(input): ValidatedJson<CreateUser>,
) -> UserResult<impl IntoResponse> {
    let user = service.create_user(input).await?;
    Ok(ApiResponse::success(user).with_status(StatusCode::CREATED))
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Users",
    params(
        ("id" = String, Path, description = "User ObjectId (24 hex characters)")
    ),
    responses(
        (status = 200, description = "User found", body = ApiResponse<UserResponse>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    Path(id): Path<String>,
) -> UserResult<ApiResponse<UserResponse>> {
    let user = service.get_user(&id).await?;
    Ok(ApiResponse::success(user))
}

/// Update a user; only supplied fields change
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Users",
    params(
        ("id" = String, Path, description = "User ObjectId (24 hex characters)")
    ),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<UserResponse>),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<UpdateUser>,
) -> UserResult<ApiResponse<UserResponse>> {
    let user = service.update_user(&id, input).await?;
    Ok(ApiResponse::success(user))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Users",
    params(
        ("id" = String, Path, description = "User ObjectId (24 hex characters)")
    ),
    responses(
        (status = 200, description = "User deleted", body = ApiResponse<DeleteResponse>),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    Path(id): Path<String>,
) -> UserResult<ApiResponse<DeleteResponse>> {
    let response = service.delete_user(&id).await?;
    Ok(ApiResponse::success(response))
}
