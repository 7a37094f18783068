use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use bytes::Bytes;

use crate::error::{ApiResponse, AppError, Result};
use crate::models::{
    Base64Content, CatalogFilter, CurrentUser, FileDetailResponse, FileRecord, IngestResponse,
    UploadMeta,
};
use crate::services::catalog::ResolvedContent;
use crate::services::{CatalogService, CommentService};
use crate::AppState;

/// List/search the catalog, newest first
/// GET /api/v1/files?q=..&subject=..&semester=..&category=..
pub async fn list_files(
    State(state): State<AppState>,
    Query(filter): Query<CatalogFilter>,
) -> Result<Json<ApiResponse<Vec<FileRecord>>>> {
    let files = CatalogService::list(&state.db, &filter).await?;
    Ok(Json(ApiResponse::success(files)))
}

/// Get one file with its comment thread
/// GET /api/v1/files/:id
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FileDetailResponse>>> {
    let file = CatalogService::get(&state.db, id).await?;
    let comments = CommentService::list_for_file(&state.db, id).await?;
    Ok(Json(ApiResponse::success(FileDetailResponse {
        file,
        comments,
    })))
}

/// Upload a file or share an external link
/// POST /api/v1/files/upload (multipart)
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<IngestResponse>>> {
    let mut file_bytes: Option<Bytes> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut drive_link: Option<String> = None;
    let mut subject = String::new();
    let mut semester = String::new();
    let mut category = String::new();
    let mut department = String::new();
    let mut description = String::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::Validation(format!("Failed to process upload: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                content_type = field.content_type().map(|s| s.to_string());
                let data = field.bytes().await.map_err(|e| {
                    AppError::Validation(format!(
                        "Failed to read upload ({}). For very large files use the link option.",
                        e
                    ))
                })?;
                if !data.is_empty() {
                    file_bytes = Some(data);
                }
            }
            "drive_link" => {
                let text = field.text().await.unwrap_or_default();
                if !text.trim().is_empty() {
                    drive_link = Some(text);
                }
            }
            "subject" => subject = field.text().await.unwrap_or_default(),
            "semester" => semester = field.text().await.unwrap_or_default(),
            "category" => category = field.text().await.unwrap_or_default(),
            "department" => department = field.text().await.unwrap_or_default(),
            "description" => description = field.text().await.unwrap_or_default(),
            _ => {}
        }
    }

    if subject.trim().is_empty() {
        return Err(AppError::Validation("Subject is required".to_string()));
    }
    if semester.trim().is_empty() {
        return Err(AppError::Validation("Semester is required".to_string()));
    }

    let meta = UploadMeta {
        subject: subject.trim().to_string(),
        semester: semester.trim().to_string(),
        category: if category.trim().is_empty() {
            "Study Material".to_string()
        } else {
            category.trim().to_string()
        },
        department: if department.trim().is_empty() {
            "General".to_string()
        } else {
            department.trim().to_string()
        },
        description: {
            let d = description.trim();
            (!d.is_empty()).then(|| d.to_string())
        },
    };

    // A link wins over a file: it is usually sent because the file was too
    // big to upload.
    let file_id = if let Some(link) = drive_link {
        CatalogService::ingest_link(&state.db, &current_user, &link, meta).await?
    } else {
        let data = file_bytes
            .ok_or_else(|| AppError::Validation("No file selected and no link provided".to_string()))?;
        let file_name = file_name
            .ok_or_else(|| AppError::Validation("No file name provided".to_string()))?;
        CatalogService::ingest_file(
            &state.db,
            state.store.as_ref(),
            &current_user,
            &file_name,
            content_type.as_deref(),
            data,
            meta,
        )
        .await?
    };

    Ok(Json(ApiResponse::success(IngestResponse { id: file_id })))
}

/// View a file inline: redirect to the backend URL, or stream the bytes
/// when the backend has no URL form
/// GET /api/v1/files/:id/view
pub async fn view_file(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response> {
    let resolved = CatalogService::resolve_view(&state.db, state.store.as_ref(), id).await?;
    render_resolved(resolved)
}

/// Download a file with the original display name
/// GET /api/v1/files/:id/download
pub async fn download_file(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response> {
    let resolved = CatalogService::resolve_download(&state.db, state.store.as_ref(), id).await?;
    render_resolved(resolved)
}

fn render_resolved(resolved: ResolvedContent) -> Result<Response> {
    match resolved {
        ResolvedContent::Redirect(url) => Ok(Redirect::temporary(&url).into_response()),
        ResolvedContent::Stream {
            data,
            content_type,
            disposition,
        } => {
            let mut builder = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, data.len());

            if let Some(name) = disposition {
                let fallback_name = name.replace(['"', '\\'], "_");
                let encoded_name = urlencoding::encode(&name).into_owned();
                builder = builder.header(
                    header::CONTENT_DISPOSITION,
                    format!(
                        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
                        fallback_name, encoded_name
                    ),
                );
            }

            builder
                .body(Body::from(data))
                .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
        }
    }
}

/// Base64-encoded content for in-browser preview
/// GET /api/v1/files/:id/content
pub async fn file_content(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Base64Content>>> {
    let data = CatalogService::fetch_base64(&state.db, state.store.as_ref(), id).await?;
    Ok(Json(ApiResponse::success(Base64Content { data })))
}

/// Retire a file (admin or original uploader)
/// POST /api/v1/files/:id/delete
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>> {
    let outcome =
        CatalogService::retire(&state.db, state.store.as_ref(), &current_user, id).await?;

    let message = if outcome.blob_deleted {
        "File deleted."
    } else {
        "File record deleted, but removing the stored copy failed."
    };
    Ok(Json(ApiResponse::<()>::success_message(message)))
}
