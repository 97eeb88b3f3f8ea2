use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::{
        ensure_admin, DataResponse, PaginatedResponse, DEFAULT_PAGE, DEFAULT_PAGE_SIZE,
    },
    services::users::{
        ChangePasswordRequest, CreateUserRequest, LoginRequest, LoginResponse, UpdateUserRequest,
        UserFilter, UserResponse, UserSummary,
    },
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListUsersParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub role: Option<String>,
}

/// Authenticate with email and password.
#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access token and user profile"),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<DataResponse<LoginResponse>>, ServiceError> {
    let response = state.users.login(request).await?;
    Ok(Json(DataResponse::new(response)))
}

/// Create a user account (admin only).
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created"),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<DataResponse<UserResponse>>), ServiceError> {
    ensure_admin(&auth)?;

    let user = state.users.create_user(request).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(user))))
}

async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<DataResponse<UserResponse>>, ServiceError> {
    if !auth.is_admin() && auth.user_id != id {
        return Err(ServiceError::Forbidden(
            "cannot view another user's profile".to_string(),
        ));
    }

    let user = state.users.get_user(id).await?;
    Ok(Json(DataResponse::new(user)))
}

async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<DataResponse<UserResponse>>, ServiceError> {
    if !auth.is_admin() && auth.user_id != id {
        return Err(ServiceError::Forbidden(
            "cannot update another user's profile".to_string(),
        ));
    }

    let user = state.users.update_user(id, request).await?;
    Ok(Json(DataResponse::new(user)))
}

async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<DataResponse<&'static str>>, ServiceError> {
    ensure_admin(&auth)?;

    state.users.delete_user(id).await?;
    Ok(Json(DataResponse::new("user deleted successfully")))
}

async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListUsersParams>,
) -> Result<Json<PaginatedResponse<UserResponse>>, ServiceError> {
    ensure_admin(&auth)?;

    let filter = UserFilter {
        page: params.page.unwrap_or(DEFAULT_PAGE),
        page_size: params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        search: params.search,
        role: params.role,
    };

    let (users, total) = state.users.list_users(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        users,
        filter.page,
        filter.page_size,
        total,
    )))
}

async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<DataResponse<&'static str>>, ServiceError> {
    if auth.user_id != id {
        return Err(ServiceError::Forbidden(
            "cannot change another user's password".to_string(),
        ));
    }

    state.users.change_password(id, request).await?;
    Ok(Json(DataResponse::new("password changed successfully")))
}

/// Reseller id/name options for the admin forms.
async fn reseller_form_options(
    State(state): State<AppState>,
) -> Result<Json<DataResponse<Vec<UserSummary>>>, ServiceError> {
    let options = state.users.reseller_options().await?;
    Ok(Json(DataResponse::new(options)))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user))
        .route("/users/:id", put(update_user))
        .route("/users/:id", delete(delete_user))
        .route("/users/:id/change-password", put(change_password))
        .route("/resellers/form", get(reseller_form_options))
}
