use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::state::AppState,
    domain::{CreateUserRequest, User, UserRole},
    error::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    users: Vec<UserDto>,
    total: usize,
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    id: Uuid,
    username: String,
    email: String,
    role: UserRole,
    created_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserDto {
    #[validate(length(min = 3, max = 32))]
    username: String,
    #[validate(email)]
    email: String,
    role: Option<UserRole>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>> {
    let users = state
        .service_context
        .user_repo
        .list(params.limit, params.offset)
        .await?;

    let total = users.len();
    let users: Vec<UserDto> = users.into_iter().map(Into::into).collect();

    Ok(Json(ListResponse { users, total }))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserDto>> {
    let user = state
        .service_context
        .user_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user.into()))
}

pub async fn create(
    State(state): State<AppState>,
    Json(dto): Json<CreateUserDto>,
) -> Result<(StatusCode, Json<UserDto>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let request = CreateUserRequest {
        username: dto.username,
        email: dto.email,
        role: dto.role.unwrap_or(UserRole::Regular),
    };

    let user = state.service_context.user_repo.create(request).await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}
