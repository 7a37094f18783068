use axum::{extract::State, Extension, Json};

use crate::error::{ApiResponse, Result};
use crate::models::{CurrentUser, LoginRequest, LoginResponse};
use crate::services::AuthService;
use crate::AppState;

/// Login
/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>> {
    let response = AuthService::login(&state.db, &state.config, req).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// Logout. Tokens are stateless; the client discards its copy.
/// POST /api/v1/auth/logout
pub async fn logout(
    Extension(current_user): Extension<CurrentUser>,
) -> Json<ApiResponse<()>> {
    tracing::debug!(username = %current_user.username, "User logged out");
    Json(ApiResponse::<()>::success_message("Logged out successfully"))
}
