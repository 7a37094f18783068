use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// File type sentinel for records that hold an external URL instead of
/// backend-held bytes.
pub const LINK_FILE_TYPE: &str = "link";

/// One catalog row per stored asset
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FileRecord {
    pub id: i64,
    pub original_filename: String,
    /// Opaque generated blob name, or the external URL for link records
    pub stored_filename: String,
    pub uploader_username: String,
    pub subject: String,
    pub semester: String,
    pub category: String,
    pub department: String,
    pub description: Option<String>,
    /// Declared extension, or the "link" sentinel
    pub file_type: String,
    /// Byte size; 0 exactly for links
    pub file_size: i64,
    /// CDN-media ingest classification ("image" | "raw"), authoritative
    /// for later URL resolution and deletion on that backend
    pub resource_tag: Option<String>,
    pub created_at: String,
}

impl FileRecord {
    pub fn is_link(&self) -> bool {
        self.file_type == LINK_FILE_TYPE
    }

    /// Extension of the original display name, lowercased. URL formats and
    /// disposition filenames derive from this, never from the generated
    /// blob name.
    pub fn extension(&self) -> String {
        match self.original_filename.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => String::new(),
        }
    }
}

/// Catalog list filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogFilter {
    pub q: Option<String>,
    pub subject: Option<String>,
    pub semester: Option<String>,
    pub category: Option<String>,
}

/// Upload metadata fields supplied by the form
#[derive(Debug, Clone)]
pub struct UploadMeta {
    pub subject: String,
    pub semester: String,
    pub category: String,
    pub department: String,
    pub description: Option<String>,
}

/// File detail response with its comment thread
#[derive(Debug, Serialize)]
pub struct FileDetailResponse {
    pub file: FileRecord,
    pub comments: Vec<crate::models::Comment>,
}

/// Ingest success payload
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub id: i64,
}

/// Base64-encoded file content for inline previews
#[derive(Debug, Serialize)]
pub struct Base64Content {
    pub data: String,
}
