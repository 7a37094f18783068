use axum::{extract::State, Json};

use crate::error::{ApiResponse, Result};
use crate::models::Notification;
use crate::services::NotificationService;
use crate::AppState;

/// Latest notifications feed
/// GET /api/v1/notifications
pub async fn latest(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Notification>>>> {
    let notifications = NotificationService::latest(&state.db, 5).await?;
    Ok(Json(ApiResponse::success(notifications)))
}
