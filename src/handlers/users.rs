use super::common::{created_response, no_content_response, success_response, PaginationParams};
use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    handlers::AppState,
    services::users::{LoginRequest, RegisterUserRequest, UpdateProfileRequest},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Router,
};
use uuid::Uuid;

/// Issue an access token for valid credentials
#[utoipa::path(
    post,
    path = "/api/users/token",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = crate::services::users::LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state
        .services
        .users
        .authenticate(&payload.username, &payload.password)
        .await?;
    Ok(success_response(response))
}

/// Register a new staff account
#[utoipa::path(
    post,
    path = "/api/users/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "User created", body = crate::services::users::UserResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.services.users.register(payload).await?;
    Ok(created_response(user))
}

/// Current user's profile
#[utoipa::path(
    get,
    path = "/api/users/me",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile returned", body = crate::services::users::UserResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn get_me(
    State(state): State<AppState>,
    current_user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.services.users.get_user(current_user.user_id).await?;
    Ok(success_response(user))
}

/// Update the current user's profile
#[utoipa::path(
    put,
    path = "/api/users/me",
    security(("bearer_auth" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = crate::services::users::UserResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn update_me(
    State(state): State<AppState>,
    current_user: AuthenticatedUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .services
        .users
        .update_profile(current_user.user_id, payload)
        .await?;
    Ok(success_response(user))
}

/// Deactivate the current user's account
#[utoipa::path(
    delete,
    path = "/api/users/me",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Account deactivated"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn deactivate_me(
    State(state): State<AppState>,
    current_user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    state.services.users.deactivate(current_user.user_id).await?;
    Ok(no_content_response())
}

/// List all staff accounts
#[utoipa::path(
    get,
    path = "/api/users",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "Users returned", body = crate::services::users::UserListResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .services
        .users
        .list_users(
            pagination.page(),
            pagination.per_page(state.config.api_max_page_size as u64),
        )
        .await?;
    Ok(success_response(users))
}

/// Toggle the admin flag on another account
#[utoipa::path(
    patch,
    path = "/api/users/admin/{id}/toggle",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Admin flag toggled", body = crate::services::users::UserResponse),
        (status = 400, description = "Cannot toggle own flag", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn toggle_admin(
    State(state): State<AppState>,
    current_user: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .services
        .users
        .toggle_admin(current_user.user_id, user_id)
        .await?;
    Ok(success_response(user))
}

/// Routes that work without a token
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/users/token", post(login))
        .route("/users/register", post(register))
}

/// Routes for any authenticated user
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me))
        .route("/users/me", put(update_me))
        .route("/users/me", delete(deactivate_me))
}

/// Administrator-only routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/admin/:id/toggle", patch(toggle_admin))
}
