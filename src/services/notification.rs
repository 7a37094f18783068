use crate::db::{Database, DbTransaction};
use crate::error::Result;
use crate::models::Notification;

/// Broadcast notifications written on privileged ingest, read as a
/// latest-N feed everywhere else.
pub struct NotificationService;

impl NotificationService {
    /// Record a notification inside the caller's transaction so it commits
    /// (or rolls back) together with the triggering insert.
    pub async fn record(tx: &mut DbTransaction, message: &str, link: Option<&str>) -> Result<i64> {
        let now = chrono::Utc::now().to_rfc3339();
        tx.insert_returning_id(
            "INSERT INTO notifications (message, link, created_at) VALUES (?, ?, ?)",
            &[message.into(), link.into(), now.into()],
        )
        .await
    }

    pub async fn latest(db: &Database, limit: i64) -> Result<Vec<Notification>> {
        db.fetch_all(
            "SELECT * FROM notifications ORDER BY created_at DESC, id DESC LIMIT ?",
            &[limit.into()],
        )
        .await
    }
}
