use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Comment on a catalog file. Tied to a user when `user_id` is set,
/// anonymous otherwise (free-text display name + optional department).
/// Cascade-deleted with its file.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Comment {
    pub id: i64,
    pub file_id: i64,
    pub user_id: Option<i64>,
    pub display_name: String,
    pub guest_department: Option<String>,
    pub body: String,
    pub created_at: String,
}

/// Add comment request
#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    pub body: String,
    #[serde(default)]
    pub guest_name: Option<String>,
    #[serde(default)]
    pub guest_department: Option<String>,
}
