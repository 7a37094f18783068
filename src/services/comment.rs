use chrono::Utc;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{Comment, CurrentUser};
use crate::services::CatalogService;

/// Comment service: authenticated or anonymous comments on catalog files
pub struct CommentService;

impl CommentService {
    /// Add a comment. Authenticated callers comment under their own name;
    /// anonymous callers supply a display name (with optional department)
    /// or fall back to "Anonymous Student".
    pub async fn add(
        db: &Database,
        file_id: i64,
        author: Option<&CurrentUser>,
        guest_name: Option<&str>,
        guest_department: Option<&str>,
        body: &str,
    ) -> Result<i64> {
        let body = body.trim();
        if body.is_empty() {
            return Err(AppError::Validation("Comment cannot be empty".to_string()));
        }

        // Resolve the file first so a missing id is a 404, not an FK error
        CatalogService::get(db, file_id).await?;

        let guest_name = guest_name.map(str::trim).filter(|s| !s.is_empty());
        let guest_department = guest_department.map(str::trim).filter(|s| !s.is_empty());

        let (user_id, display_name) = match author {
            Some(user) => (Some(user.id), user.username.clone()),
            None => {
                let display = match (guest_name, guest_department) {
                    (Some(name), Some(dept)) => format!("{} ({})", name, dept),
                    (Some(name), None) => name.to_string(),
                    _ => "Anonymous Student".to_string(),
                };
                (None, display)
            }
        };

        let now = Utc::now().to_rfc3339();
        let comment_id = db
            .insert_returning_id(
                "INSERT INTO comments (file_id, user_id, display_name, guest_department, body, \
                 created_at) VALUES (?, ?, ?, ?, ?, ?)",
                &[
                    file_id.into(),
                    user_id.into(),
                    display_name.into(),
                    guest_department.into(),
                    body.into(),
                    now.into(),
                ],
            )
            .await?;

        Ok(comment_id)
    }

    pub async fn list_for_file(db: &Database, file_id: i64) -> Result<Vec<Comment>> {
        db.fetch_all(
            "SELECT * FROM comments WHERE file_id = ? ORDER BY created_at DESC, id DESC",
            &[file_id.into()],
        )
        .await
    }

    /// Delete a comment (admin only). Returns the parent file id so the
    /// caller can send the client back to the thread.
    pub async fn delete(db: &Database, caller: &CurrentUser, comment_id: i64) -> Result<i64> {
        if !caller.is_admin() {
            return Err(AppError::Permission(
                "Only an admin can delete comments".to_string(),
            ));
        }

        let comment: Comment = db
            .fetch_optional(
                "SELECT * FROM comments WHERE id = ?",
                &[comment_id.into()],
            )
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

        db.execute("DELETE FROM comments WHERE id = ?", &[comment_id.into()])
            .await?;

        Ok(comment.file_id)
    }
}
