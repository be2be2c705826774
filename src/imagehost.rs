// src/imagehost.rs

//! Client for the external image host (ImgBB upload API).

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::config::Config;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no image host API key configured")]
    NotConfigured,

    #[error("image host unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("image host rejected the upload: {0}")]
    Rejected(String),
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    data: Option<UploadedImage>,
    error: Option<UploadFailure>,
}

#[derive(Debug, Deserialize)]
struct UploadedImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct UploadFailure {
    message: String,
}

#[derive(Debug, Clone)]
pub struct ImageHost {
    client: reqwest::Client,
    upload_url: String,
    api_key: Option<String>,
}

impl ImageHost {
    pub fn new(upload_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            upload_url: upload_url.into(),
            api_key,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.imgbb_upload_url.clone(), config.imgbb_api_key.clone())
    }

    /// Uploads a base64-encoded image and returns its public URL.
    pub async fn upload(&self, image_base64: &str) -> Result<String, UploadError> {
        let key = self.api_key.as_deref().ok_or(UploadError::NotConfigured)?;

        let response = self
            .client
            .post(&self.upload_url)
            .query(&[("key", key)])
            .form(&[("image", image_base64)])
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        let body: UploadResponse = response.json().await?;

        if !status.is_success() || !body.success {
            let message = body
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| format!("status {}", status));
            return Err(UploadError::Rejected(message));
        }

        body.data
            .map(|image| image.url)
            .ok_or_else(|| UploadError::Rejected("response carried no image URL".to_string()))
    }
}
