//! Minimal S3 object client: put/get/delete plus presigned GET URLs.

use bytes::Bytes;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::config::ObjectStoreConfig;
use crate::error::{AppError, Result};
use crate::storage::s3::signer::{uri_encode, Signer, UNSIGNED_PAYLOAD};

#[derive(Debug, Clone)]
pub struct S3Client {
    access_key_id: String,
    secret_access_key: String,
    bucket: String,
    region: String,
    http: reqwest::Client,
}

impl S3Client {
    pub fn new(config: &ObjectStoreConfig) -> Self {
        Self {
            access_key_id: config.access_key_id.clone(),
            secret_access_key: config.secret_access_key.clone(),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// Virtual-host style bucket endpoint
    pub fn host(&self) -> String {
        format!("{}.s3.{}.amazonaws.com", self.bucket, self.region)
    }

    fn signer(&self) -> Signer<'_> {
        Signer {
            access_key: &self.access_key_id,
            secret_key: &self.secret_access_key,
            region: &self.region,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "https://{}{}",
            self.host(),
            uri_encode(&format!("/{}", key.trim_start_matches('/')), false)
        )
    }

    fn signed_headers(&self, method: &str, key: &str) -> Result<HeaderMap> {
        let signature = self
            .signer()
            .sign_request(method, &self.host(), key, Utc::now());

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-amz-date",
            HeaderValue::from_str(&signature.amz_date)
                .map_err(|e| AppError::Internal(e.to_string()))?,
        );
        headers.insert(
            "x-amz-content-sha256",
            HeaderValue::from_static(UNSIGNED_PAYLOAD),
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&signature.authorization)
                .map_err(|e| AppError::Internal(e.to_string()))?,
        );
        Ok(headers)
    }

    pub async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<()> {
        let mut headers = self.signed_headers("PUT", key)?;
        if let Some(ct) = content_type {
            if let Ok(value) = HeaderValue::from_str(ct) {
                headers.insert(CONTENT_TYPE, value);
            }
        }

        let response = self
            .http
            .put(self.object_url(key))
            .headers(headers)
            .body(data)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::BackendUnavailable(format!(
                "Object store put failed with status {}",
                response.status()
            )));
        }

        tracing::info!("Uploaded object {}", key);
        Ok(())
    }

    pub async fn get_object(&self, key: &str) -> Result<Bytes> {
        let headers = self.signed_headers("GET", key)?;

        let response = self
            .http
            .get(self.object_url(key))
            .headers(headers)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Object not found: {}", key)));
        }
        if !response.status().is_success() {
            return Err(AppError::BackendUnavailable(format!(
                "Object store get failed with status {}",
                response.status()
            )));
        }

        Ok(response.bytes().await?)
    }

    /// Delete an object. A missing key is not an error.
    pub async fn delete_object(&self, key: &str) -> Result<()> {
        let headers = self.signed_headers("DELETE", key)?;

        let response = self
            .http
            .delete(self.object_url(key))
            .headers(headers)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(AppError::BackendUnavailable(format!(
                "Object store delete failed with status {}",
                response.status()
            )));
        }

        tracing::debug!("Deleted object {}", key);
        Ok(())
    }

    /// Presigned GET URL, time-bounded, optionally forcing an attachment
    /// disposition with the given display name.
    pub fn presigned_get_url(
        &self,
        key: &str,
        expires_secs: u64,
        disposition: Option<&str>,
    ) -> String {
        self.signer()
            .presign_get(&self.host(), key, expires_secs, disposition, Utc::now())
    }
}
