//! Coverage report upload to a remote collector

use crate::core::UploadError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Trait for coverage uploads - allows for different implementations
#[async_trait]
pub trait CoverageUploader: Send + Sync {
    /// Send `report` with `metadata` to the collector
    async fn upload(&self, report: &Path, metadata: &BTreeMap<String, String>) -> Result<(), UploadError>;
}

/// Uploads reports as a multipart POST
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpUploader {
    pub fn new(endpoint: impl Into<String>, token: Option<String>, timeout_secs: u64) -> Result<Self, UploadError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token,
        })
    }

    /// Read the bearer token from the environment variable `token_env`, if set
    pub fn token_from_env(token_env: Option<&str>) -> Option<String> {
        token_env
            .and_then(|name| std::env::var(name).ok())
            .filter(|token| !token.is_empty())
    }
}

#[async_trait]
impl CoverageUploader for HttpUploader {
    async fn upload(&self, report: &Path, metadata: &BTreeMap<String, String>) -> Result<(), UploadError> {
        let bytes = tokio::fs::read(report)
            .await
            .map_err(|source| UploadError::Report {
                path: report.to_path_buf(),
                source,
            })?;

        let file_name = report
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "coverage".to_string());

        debug!(endpoint = %self.endpoint, bytes = bytes.len(), "Uploading coverage report");

        let mut form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
        for (key, value) in metadata {
            form = form.text(key.clone(), value.clone());
        }

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(endpoint = %self.endpoint, "Coverage report uploaded");
        Ok(())
    }
}
