use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Extension, Json,
};
use serde::Serialize;

use crate::error::{ApiResponse, Result};
use crate::middleware::auth::maybe_current_user;
use crate::models::{AddCommentRequest, CurrentUser};
use crate::services::CommentService;
use crate::AppState;

#[derive(Serialize)]
pub struct CommentCreated {
    pub id: i64,
}

/// Add a comment; works for both authenticated and anonymous callers
/// POST /api/v1/files/:id/comments
pub async fn add_comment(
    State(state): State<AppState>,
    Path(file_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<AddCommentRequest>,
) -> Result<Json<ApiResponse<CommentCreated>>> {
    let current_user = maybe_current_user(&state, &headers).await;

    let id = CommentService::add(
        &state.db,
        file_id,
        current_user.as_ref(),
        req.guest_name.as_deref(),
        req.guest_department.as_deref(),
        &req.body,
    )
    .await?;

    Ok(Json(ApiResponse::success(CommentCreated { id })))
}

/// Delete a comment (admin only)
/// POST /api/v1/comments/:id/delete
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>> {
    CommentService::delete(&state.db, &current_user, id).await?;
    Ok(Json(ApiResponse::<()>::success_message("Comment deleted")))
}
