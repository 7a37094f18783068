use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::LocalStoreConfig;
use crate::error::{AppError, Result};
use crate::storage::{BackendKind, BlobStore};

/// Local filesystem backend. Blobs live flat under the configured
/// directory; clients are always served by streaming, never by URL.
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new(config: LocalStoreConfig) -> Self {
        Self {
            base_path: PathBuf::from(config.base_path),
        }
    }

    fn full_path(&self, name: &str) -> PathBuf {
        self.base_path.join(name)
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn put(
        &self,
        name: &str,
        data: Bytes,
        _content_type: Option<&str>,
    ) -> Result<Option<String>> {
        let path = self.full_path(name);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::BackendUnavailable(e.to_string()))?;
        }

        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| AppError::BackendUnavailable(e.to_string()))?;
        file.write_all(&data)
            .await
            .map_err(|e| AppError::BackendUnavailable(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| AppError::BackendUnavailable(e.to_string()))?;

        tracing::debug!("Saved blob to {:?}", path);
        Ok(None)
    }

    async fn resolve_url(
        &self,
        _name: &str,
        _resource_tag: Option<&str>,
        _extension: &str,
        _disposition: Option<&str>,
    ) -> Result<Option<String>> {
        // No URL form; the caller streams the bytes itself
        Ok(None)
    }

    async fn fetch_bytes(
        &self,
        name: &str,
        _resource_tag: Option<&str>,
        _extension: &str,
    ) -> Result<Bytes> {
        let path = self.full_path(name);

        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(format!("Blob not found: {}", name))
            } else {
                AppError::BackendUnavailable(format!("Failed to read blob: {}", e))
            }
        })?;

        Ok(Bytes::from(data))
    }

    async fn delete(
        &self,
        name: &str,
        _resource_tag: Option<&str>,
        _extension: &str,
    ) -> Result<()> {
        let path = self.full_path(name);

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("Deleted blob {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::BackendUnavailable(format!(
                "Failed to delete blob: {}",
                e
            ))),
        }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> LocalStore {
        LocalStore::new(LocalStoreConfig {
            base_path: dir.path().to_string_lossy().into_owned(),
        })
    }

    #[tokio::test]
    async fn put_then_fetch_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let payload = Bytes::from_static(b"%PDF-1.7 lecture notes");
        store
            .put("abc123.pdf", payload.clone(), Some("application/pdf"))
            .await
            .unwrap();

        let read_back = store.fetch_bytes("abc123.pdf", None, "pdf").await.unwrap();
        assert_eq!(read_back, payload);
    }

    #[tokio::test]
    async fn fetch_missing_blob_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let err = store.fetch_bytes("missing.pdf", None, "pdf").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        store
            .put("gone.txt", Bytes::from_static(b"x"), None)
            .await
            .unwrap();
        store.delete("gone.txt", None, "txt").await.unwrap();
        // second delete of a missing blob is not an error
        store.delete("gone.txt", None, "txt").await.unwrap();
    }

    #[tokio::test]
    async fn local_store_has_no_url_form() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let url = store
            .resolve_url("abc123.pdf", None, "pdf", Some("notes.pdf"))
            .await
            .unwrap();
        assert!(url.is_none());
    }
}
