use async_trait::async_trait;
use bytes::Bytes;

use crate::config::ObjectStoreConfig;
use crate::error::Result;
use crate::storage::s3::client::S3Client;
use crate::storage::{BackendKind, BlobStore};

/// S3-compatible object storage backend
pub struct S3Store {
    client: S3Client,
    url_expire_seconds: u64,
}

impl S3Store {
    pub fn new(config: ObjectStoreConfig) -> Self {
        let client = S3Client::new(&config);
        Self {
            client,
            url_expire_seconds: config.url_expire_seconds,
        }
    }
}

#[async_trait]
impl BlobStore for S3Store {
    async fn put(
        &self,
        name: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<Option<String>> {
        self.client.put_object(name, data, content_type).await?;
        // Object storage needs no resource classification
        Ok(None)
    }

    async fn resolve_url(
        &self,
        name: &str,
        _resource_tag: Option<&str>,
        _extension: &str,
        disposition: Option<&str>,
    ) -> Result<Option<String>> {
        let url = self
            .client
            .presigned_get_url(name, self.url_expire_seconds, disposition);
        Ok(Some(url))
    }

    async fn fetch_bytes(
        &self,
        name: &str,
        _resource_tag: Option<&str>,
        _extension: &str,
    ) -> Result<Bytes> {
        self.client.get_object(name).await
    }

    async fn delete(
        &self,
        name: &str,
        _resource_tag: Option<&str>,
        _extension: &str,
    ) -> Result<()> {
        self.client.delete_object(name).await
    }

    fn kind(&self) -> BackendKind {
        BackendKind::ObjectStore
    }
}
