//! CDN media host backend (Cloudinary wire protocol).
//!
//! The host classifies every ingested blob as image-class or raw-binary;
//! that classification comes back from the upload call and is persisted on
//! the catalog row as the resource tag. Later URL resolution and deletion
//! must use the stored tag — re-deriving it from the extension is
//! unreliable (a PDF can land in either class depending on content).

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use sha1::{Digest, Sha1};

use crate::config::CdnConfig;
use crate::error::{AppError, Result};
use crate::storage::{BackendKind, BlobStore};

pub const TAG_IMAGE: &str = "image";
pub const TAG_RAW: &str = "raw";

pub struct CdnMediaStore {
    config: CdnConfig,
    http: reqwest::Client,
}

impl CdnMediaStore {
    pub fn new(config: CdnConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Public id under which the host knows a blob: the generated name
    /// minus its extension.
    fn public_id(name: &str) -> &str {
        match name.rsplit_once('.') {
            Some((base, _)) => base,
            None => name,
        }
    }

    /// Sign an API call: SHA-1 over the sorted `k=v` parameter string with
    /// the secret appended.
    fn sign_params(&self, params: &[(&str, &str)]) -> String {
        let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        hex::encode(Sha1::digest(
            format!("{}{}", to_sign, self.config.api_secret).as_bytes(),
        ))
    }

    /// Resolve the effective tag: the persisted one is authoritative;
    /// rows predating the tag column fall back to the extension guess.
    fn effective_tag(&self, stored: Option<&str>, extension: &str) -> String {
        match stored {
            Some(tag) if !tag.is_empty() => tag.to_string(),
            _ => {
                let guessed = Self::guess_tag(extension);
                tracing::warn!(
                    extension,
                    guessed,
                    "No persisted resource tag; falling back to extension guess"
                );
                guessed.to_string()
            }
        }
    }

    /// Legacy-row heuristic only. Known unreliable for PDFs.
    fn guess_tag(extension: &str) -> &'static str {
        match extension {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "pdf" => TAG_IMAGE,
            _ => TAG_RAW,
        }
    }

    /// Delivery URL for a blob. The original extension is appended
    /// explicitly: the host serves the wrong content type or 404s when the
    /// format is left to be inferred.
    pub fn delivery_url(
        &self,
        name: &str,
        tag: &str,
        extension: &str,
        attachment: Option<&str>,
    ) -> String {
        let public_id = Self::public_id(name);

        let mut segments = vec![
            self.config.delivery_base.trim_end_matches('/').to_string(),
            self.config.cloud_name.clone(),
            tag.to_string(),
            "upload".to_string(),
        ];
        if let Some(filename) = attachment {
            segments.push(Self::attachment_flag(filename));
        }
        if extension.is_empty() {
            segments.push(public_id.to_string());
        } else {
            segments.push(format!("{}.{}", public_id, extension));
        }

        segments.join("/")
    }

    /// `fl_attachment` transformation, with the download name when one
    /// survives sanitization (the flag value cannot carry dots or slashes).
    fn attachment_flag(filename: &str) -> String {
        let base = match filename.rsplit_once('.') {
            Some((base, _)) => base,
            None => filename,
        };
        let safe: String = base
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if safe.is_empty() {
            "fl_attachment".to_string()
        } else {
            format!("fl_attachment:{}", safe)
        }
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!(
            "{}/v1_1/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name,
            endpoint
        )
    }
}

#[async_trait]
impl BlobStore for CdnMediaStore {
    async fn put(
        &self,
        name: &str,
        data: Bytes,
        _content_type: Option<&str>,
    ) -> Result<Option<String>> {
        let public_id = Self::public_id(name).to_string();
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign_params(&[
            ("public_id", public_id.as_str()),
            ("timestamp", timestamp.as_str()),
        ]);

        let form = Form::new()
            .part("file", Part::bytes(data.to_vec()).file_name(name.to_string()))
            .text("public_id", public_id)
            .text("timestamp", timestamp)
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature);

        // The auto endpoint lets the host classify the asset itself
        let response = self
            .http
            .post(self.api_url("auto/upload"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::BackendUnavailable(format!(
                "Media upload failed with status {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response.json().await?;
        let tag = body
            .get("resource_type")
            .and_then(|v| v.as_str())
            .unwrap_or(TAG_RAW)
            .to_string();

        tracing::info!(blob = name, tag = %tag, "Media upload classified");
        Ok(Some(tag))
    }

    async fn resolve_url(
        &self,
        name: &str,
        resource_tag: Option<&str>,
        extension: &str,
        disposition: Option<&str>,
    ) -> Result<Option<String>> {
        let tag = self.effective_tag(resource_tag, extension);
        Ok(Some(self.delivery_url(name, &tag, extension, disposition)))
    }

    async fn fetch_bytes(
        &self,
        name: &str,
        resource_tag: Option<&str>,
        extension: &str,
    ) -> Result<Bytes> {
        let tag = self.effective_tag(resource_tag, extension);
        let url = self.delivery_url(name, &tag, extension, None);

        let response = self.http.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Blob not found: {}", name)));
        }
        if !response.status().is_success() {
            return Err(AppError::BackendUnavailable(format!(
                "Media fetch failed with status {}",
                response.status()
            )));
        }

        Ok(response.bytes().await?)
    }

    async fn delete(
        &self,
        name: &str,
        resource_tag: Option<&str>,
        extension: &str,
    ) -> Result<()> {
        let tag = self.effective_tag(resource_tag, extension);
        let public_id = Self::public_id(name).to_string();
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign_params(&[
            ("public_id", public_id.as_str()),
            ("timestamp", timestamp.as_str()),
        ]);

        // The destroy endpoint is scoped by resource class
        let response = self
            .http
            .post(self.api_url(&format!("{}/destroy", tag)))
            .form(&[
                ("public_id", public_id.as_str()),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.config.api_key.as_str()),
                ("signature", signature.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::BackendUnavailable(format!(
                "Media destroy failed with status {}",
                response.status()
            )));
        }

        tracing::debug!(blob = name, tag = %tag, "Deleted media blob");
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::CdnMedia
    }
}
