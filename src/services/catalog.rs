use base64::Engine as _;
use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use crate::db::{Database, SqlParam};
use crate::error::{AppError, Result};
use crate::models::{CatalogFilter, CurrentUser, FileRecord, UploadMeta, LINK_FILE_TYPE};
use crate::services::NotificationService;
use crate::storage::BlobStore;

/// Declared extensions accepted for upload. Archives and executables are
/// rejected as a security boundary.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "ppt", "pptx", "doc", "docx", "jpg", "jpeg", "png", "gif", "bmp", "webp", "svg",
    "txt", "xlsx", "xls", "csv", "py", "java", "cpp", "c", "js", "html", "css",
];

pub const MAX_UPLOAD_BYTES: usize = 30 * 1024 * 1024;

const INSERT_FILE_SQL: &str = "INSERT INTO files (original_filename, stored_filename, \
     uploader_username, subject, semester, category, department, description, file_type, \
     file_size, resource_tag, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

/// Content resolved for a view or download request
pub enum ResolvedContent {
    /// Send the client to this URL (link records and URL-capable backends)
    Redirect(String),
    /// Stream the bytes directly (backends without a URL form)
    Stream {
        data: Bytes,
        content_type: String,
        disposition: Option<String>,
    },
}

/// Outcome of a retire operation. Row deletion proceeds even when the
/// backend delete fails; the caller reports the partial failure.
#[derive(Debug)]
pub struct RetireOutcome {
    pub blob_deleted: bool,
}

/// Catalog record manager: orchestrates blob writes, metadata rows and
/// notifications as one best-effort sequence per operation.
pub struct CatalogService;

impl CatalogService {
    /// Validate a declared filename against the allow-list, returning the
    /// lowercased extension.
    pub fn allowed_extension(filename: &str) -> Option<String> {
        filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
    }

    /// Ingest an uploaded file: validate, write the blob, then persist the
    /// metadata row (and an admin notification) in one transaction. The
    /// blob write always precedes the insert; an insert failure leaves an
    /// orphaned blob behind rather than a dangling row.
    pub async fn ingest_file(
        db: &Database,
        store: &dyn BlobStore,
        uploader: &CurrentUser,
        original_filename: &str,
        content_type: Option<&str>,
        data: Bytes,
        meta: UploadMeta,
    ) -> Result<i64> {
        let extension = Self::allowed_extension(original_filename).ok_or_else(|| {
            AppError::Validation(
                "Invalid file type (ZIP and EXE are not allowed)".to_string(),
            )
        })?;

        if data.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::Validation(
                "File too large (Max 30MB). Please share it as an external link instead."
                    .to_string(),
            ));
        }

        let stored_name = format!("{}.{}", Uuid::new_v4(), extension);
        let file_size = data.len() as i64;

        let resource_tag = store.put(&stored_name, data, content_type).await?;

        let now = Utc::now().to_rfc3339();
        let mut tx = db.begin().await?;
        let file_id = tx
            .insert_returning_id(
                INSERT_FILE_SQL,
                &[
                    original_filename.into(),
                    stored_name.clone().into(),
                    uploader.username.clone().into(),
                    meta.subject.clone().into(),
                    meta.semester.clone().into(),
                    meta.category.clone().into(),
                    meta.department.clone().into(),
                    meta.description.clone().into(),
                    extension.into(),
                    file_size.into(),
                    resource_tag.into(),
                    now.into(),
                ],
            )
            .await
            .map_err(|e| {
                tracing::warn!(
                    blob = %stored_name,
                    "File metadata insert failed after blob write; blob orphaned"
                );
                e
            })?;

        if uploader.is_admin() {
            let message = format!(
                "New {} note posted by Admin: {}",
                meta.subject, original_filename
            );
            let link = format!("/files/{}", file_id);
            NotificationService::record(&mut tx, &message, Some(link.as_str())).await?;
        }

        tx.commit().await?;
        tracing::info!(file_id, uploader = %uploader.username, "File ingested");
        Ok(file_id)
    }

    /// Ingest an external link: no blob, zero size, "link" type. The URL
    /// itself is the stored name.
    pub async fn ingest_link(
        db: &Database,
        uploader: &CurrentUser,
        url: &str,
        meta: UploadMeta,
    ) -> Result<i64> {
        let url = url.trim();
        if url.is_empty() {
            return Err(AppError::Validation("No link provided".to_string()));
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = db.begin().await?;
        let file_id = tx
            .insert_returning_id(
                INSERT_FILE_SQL,
                &[
                    "Shared Link".into(),
                    url.into(),
                    uploader.username.clone().into(),
                    meta.subject.clone().into(),
                    meta.semester.clone().into(),
                    meta.category.clone().into(),
                    meta.department.clone().into(),
                    meta.description.clone().into(),
                    LINK_FILE_TYPE.into(),
                    0i64.into(),
                    SqlParam::Null,
                    now.into(),
                ],
            )
            .await?;

        if uploader.is_admin() {
            let message = format!("New {} link posted by Admin", meta.subject);
            let link = format!("/files/{}", file_id);
            NotificationService::record(&mut tx, &message, Some(link.as_str())).await?;
        }

        tx.commit().await?;
        tracing::info!(file_id, uploader = %uploader.username, "Link ingested");
        Ok(file_id)
    }

    pub async fn get(db: &Database, file_id: i64) -> Result<FileRecord> {
        db.fetch_optional("SELECT * FROM files WHERE id = ?", &[file_id.into()])
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))
    }

    /// List catalog records, newest first, filtered by free text (name or
    /// subject), subject, semester and category.
    pub async fn list(db: &Database, filter: &CatalogFilter) -> Result<Vec<FileRecord>> {
        let mut sql = String::from("SELECT * FROM files WHERE 1=1");
        let mut params: Vec<SqlParam> = Vec::new();

        if let Some(q) = non_empty(&filter.q) {
            sql.push_str(" AND (original_filename LIKE ? OR subject LIKE ?)");
            params.push(like(q));
            params.push(like(q));
        }
        if let Some(subject) = non_empty(&filter.subject) {
            sql.push_str(" AND subject LIKE ?");
            params.push(like(subject));
        }
        if let Some(semester) = non_empty(&filter.semester) {
            sql.push_str(" AND semester LIKE ?");
            params.push(like(semester));
        }
        if let Some(category) = non_empty(&filter.category) {
            sql.push_str(" AND category LIKE ?");
            params.push(like(category));
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC");
        db.fetch_all(&sql, &params).await
    }

    /// Resolve a record for inline viewing
    pub async fn resolve_view(
        db: &Database,
        store: &dyn BlobStore,
        file_id: i64,
    ) -> Result<ResolvedContent> {
        Self::resolve(db, store, file_id, false).await
    }

    /// Resolve a record for download: same as viewing plus a forced
    /// attachment disposition carrying the original display name.
    pub async fn resolve_download(
        db: &Database,
        store: &dyn BlobStore,
        file_id: i64,
    ) -> Result<ResolvedContent> {
        Self::resolve(db, store, file_id, true).await
    }

    async fn resolve(
        db: &Database,
        store: &dyn BlobStore,
        file_id: i64,
        attachment: bool,
    ) -> Result<ResolvedContent> {
        let record = Self::get(db, file_id).await?;

        if record.is_link() {
            return Ok(ResolvedContent::Redirect(record.stored_filename));
        }

        let extension = record.extension();
        let disposition = attachment.then(|| record.original_filename.clone());

        if let Some(url) = store
            .resolve_url(
                &record.stored_filename,
                record.resource_tag.as_deref(),
                &extension,
                disposition.as_deref(),
            )
            .await?
        {
            return Ok(ResolvedContent::Redirect(url));
        }

        let data = store
            .fetch_bytes(
                &record.stored_filename,
                record.resource_tag.as_deref(),
                &extension,
            )
            .await?;
        let content_type = mime_guess::from_path(&record.original_filename)
            .first_or_octet_stream()
            .to_string();

        Ok(ResolvedContent::Stream {
            data,
            content_type,
            disposition,
        })
    }

    /// Fetch a record's bytes base64-encoded for in-browser preview
    pub async fn fetch_base64(
        db: &Database,
        store: &dyn BlobStore,
        file_id: i64,
    ) -> Result<String> {
        let record = Self::get(db, file_id).await?;

        if record.is_link() {
            return Err(AppError::Validation(
                "Link records hold no stored bytes".to_string(),
            ));
        }

        let data = store
            .fetch_bytes(
                &record.stored_filename,
                record.resource_tag.as_deref(),
                &record.extension(),
            )
            .await?;

        Ok(base64::engine::general_purpose::STANDARD.encode(&data))
    }

    /// Retire a record: authorize, attempt the backend delete, then drop
    /// the row regardless. A failed backend delete is reported, never
    /// blocking.
    pub async fn retire(
        db: &Database,
        store: &dyn BlobStore,
        caller: &CurrentUser,
        file_id: i64,
    ) -> Result<RetireOutcome> {
        let record = Self::get(db, file_id).await?;

        if !caller.is_admin() && caller.username != record.uploader_username {
            return Err(AppError::Permission(
                "Only an admin or the original uploader can delete a file".to_string(),
            ));
        }

        let mut blob_deleted = true;
        if !record.is_link() {
            if let Err(e) = store
                .delete(
                    &record.stored_filename,
                    record.resource_tag.as_deref(),
                    &record.extension(),
                )
                .await
            {
                tracing::warn!(
                    file_id,
                    error = %e,
                    "Backend delete failed; removing catalog record anyway"
                );
                blob_deleted = false;
            }
        }

        db.execute("DELETE FROM files WHERE id = ?", &[file_id.into()])
            .await?;

        tracing::info!(file_id, blob_deleted, "File retired");
        Ok(RetireOutcome { blob_deleted })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn like(value: &str) -> SqlParam {
    SqlParam::Text(format!("%{}%", value))
}
