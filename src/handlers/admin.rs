use axum::{extract::State, Extension, Json};
use serde::Serialize;

use crate::error::{ApiResponse, AppError, Result};
use crate::models::{CatalogFilter, CreateUserRequest, CurrentUser, FileRecord, User, UserResponse};
use crate::services::{AuthService, CatalogService};
use crate::AppState;

#[derive(Serialize)]
pub struct AdminOverview {
    pub users: Vec<UserResponse>,
    pub files: Vec<FileRecord>,
}

/// Admin dashboard data: all users and the full catalog
/// GET /api/v1/admin/overview
pub async fn overview(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<AdminOverview>>> {
    if !current_user.is_admin() {
        return Err(AppError::Permission("Admin access required".to_string()));
    }

    let users: Vec<User> = state
        .db
        .fetch_all("SELECT * FROM users ORDER BY id", &[])
        .await?;
    let files = CatalogService::list(&state.db, &CatalogFilter::default()).await?;

    Ok(Json(ApiResponse::success(AdminOverview {
        users: users.into_iter().map(UserResponse::from).collect(),
        files,
    })))
}

/// Provision a new user (admin only)
/// POST /api/v1/admin/users
pub async fn create_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    if !current_user.is_admin() {
        return Err(AppError::Permission("Admin access required".to_string()));
    }

    let user = AuthService::provision_user(&state.db, req).await?;
    Ok(Json(ApiResponse::success(user)))
}
