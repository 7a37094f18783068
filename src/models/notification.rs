use serde::Serialize;
use sqlx::FromRow;

/// Broadcast notification emitted on privileged ingest
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: i64,
    pub message: String,
    pub link: Option<String>,
    pub created_at: String,
}
