pub mod cdn;
pub mod local;
pub mod s3;

pub use cdn::CdnMediaStore;
pub use local::LocalStore;
pub use s3::S3Store;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::error::Result;

/// The blob backend active for this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    ObjectStore,
    CdnMedia,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::ObjectStore => "object_store",
            BackendKind::CdnMedia => "cdn_media",
        }
    }
}

/// Blob storage facade. One blob per generated name, held by exactly one
/// backend. `extension` always refers to the original display name's
/// extension, never the generated blob name's.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob under the generated name. Returns the backend's
    /// resource classification when it has one (CDN-media only); callers
    /// persist it and pass it back on every later access.
    async fn put(
        &self,
        name: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<Option<String>>;

    /// Resolve a blob to a URL the client can be redirected to. `None`
    /// means the backend has no URL form and the caller must stream bytes
    /// directly. `disposition` forces attachment download under the given
    /// display name.
    async fn resolve_url(
        &self,
        name: &str,
        resource_tag: Option<&str>,
        extension: &str,
        disposition: Option<&str>,
    ) -> Result<Option<String>>;

    /// Fetch the blob's bytes
    async fn fetch_bytes(
        &self,
        name: &str,
        resource_tag: Option<&str>,
        extension: &str,
    ) -> Result<Bytes>;

    /// Delete the blob. Missing blobs are not an error.
    async fn delete(&self, name: &str, resource_tag: Option<&str>, extension: &str) -> Result<()>;

    fn kind(&self) -> BackendKind;
}

/// Pick the active backend from credential-bundle presence.
///
/// Pure and total: CDN-media wins over object storage wins over the local
/// fallback. Evaluated once at startup; a backend change needs a restart.
pub fn select_backend(config: &StorageConfig) -> BackendKind {
    if config.cdn.is_some() {
        BackendKind::CdnMedia
    } else if config.object_store.is_some() {
        BackendKind::ObjectStore
    } else {
        BackendKind::Local
    }
}

/// Construct the selected backend once, for injection into the catalog
pub fn build_blob_store(config: &StorageConfig) -> Arc<dyn BlobStore> {
    if let Some(cdn) = &config.cdn {
        Arc::new(CdnMediaStore::new(cdn.clone()))
    } else if let Some(object_store) = &config.object_store {
        Arc::new(S3Store::new(object_store.clone()))
    } else {
        Arc::new(LocalStore::new(config.local.clone()))
    }
}
