use async_trait::async_trait;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::spotify::truncate_body;

const GCS_API_URL: &str = "https://storage.googleapis.com";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("upload of {blob} rejected: {status} - {body}")]
    Upload {
        blob: String,
        status: u16,
        body: String,
    },
    #[error("invalid blob name: {0}")]
    InvalidName(String),
    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Named JSON blob persistence.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Writes `payload` under `blob_name` and returns where it can be read back.
    async fn upload(&self, blob_name: &str, payload: &Value) -> Result<String, StorageError>;
}

pub fn from_config(config: &StorageConfig, client: reqwest::Client) -> Arc<dyn BlobStore> {
    match config {
        StorageConfig::Gcs {
            bucket,
            endpoint,
            access_token,
        } => Arc::new(GcsBlobStore::new(
            bucket.clone(),
            endpoint.clone(),
            access_token.clone(),
            client,
        )),
        StorageConfig::Local { root } => Arc::new(LocalBlobStore::new(root)),
    }
}

fn validate_blob_name(blob_name: &str) -> Result<(), StorageError> {
    let path = Path::new(blob_name);
    let clean = !blob_name.is_empty()
        && !blob_name.ends_with('/')
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if clean {
        Ok(())
    } else {
        Err(StorageError::InvalidName(blob_name.to_string()))
    }
}

/// Google Cloud Storage through its JSON API. Also talks to emulators
/// (`STORAGE_EMULATOR_HOST`), which accept unauthenticated uploads.
pub struct GcsBlobStore {
    bucket: String,
    endpoint: Option<String>,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl GcsBlobStore {
    pub fn new(
        bucket: String,
        endpoint: Option<String>,
        access_token: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            bucket,
            endpoint: endpoint.map(|e| e.trim_end_matches('/').to_string()),
            access_token,
            client,
        }
    }

    fn api_url(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(GCS_API_URL)
    }

    fn public_url(&self, blob_name: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => format!(
                "{}/storage/v1/b/{}/o/{}?alt=media",
                endpoint,
                self.bucket,
                urlencoding::encode(blob_name)
            ),
            None => format!("{}/{}/{}", GCS_API_URL, self.bucket, blob_name),
        }
    }
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn upload(&self, blob_name: &str, payload: &Value) -> Result<String, StorageError> {
        validate_blob_name(blob_name)?;

        let url = format!(
            "{}/upload/storage/v1/b/{}/o",
            self.api_url(),
            urlencoding::encode(&self.bucket)
        );
        let body = serde_json::to_vec_pretty(payload)?;

        let mut request = self
            .client
            .post(&url)
            .query(&[("uploadType", "media"), ("name", blob_name)])
            .header("Content-Type", "application/json")
            .body(body);
        if let Some(token) = &self.access_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StorageError::Upload {
                blob: blob_name.to_string(),
                status: status.as_u16(),
                body: truncate_body(text),
            });
        }

        Ok(self.public_url(blob_name))
    }
}

/// Writes blobs as pretty-printed files under a root directory.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, blob_name: &str, payload: &Value) -> Result<String, StorageError> {
        validate_blob_name(blob_name)?;

        let path = self.root.join(blob_name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(payload)?;
        tokio::fs::write(&path, body).await?;

        let absolute = tokio::fs::canonicalize(&path).await.unwrap_or(path);
        Ok(format!("file://{}", absolute.display()))
    }
}
