//! Thumbnail post-processor client.
//!
//! After a successful upload the pipeline asks this collaborator to derive a
//! small preview variant from the stored asset. Strictly fire-and-forget:
//! the queue manager spawns the request and only logs failures; an item's
//! terminal status never depends on thumbnailing.

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("Thumbnail request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait ThumbnailClient: Send + Sync {
    async fn request_thumbnail(&self, asset_url: &str, entity_id: Uuid)
        -> Result<(), ThumbnailError>;
}

/// HTTP thumbnail client: POSTs the asset URL and owning entity.
pub struct HttpThumbnailClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpThumbnailClient {
    pub fn new(endpoint: String) -> Result<Self, ThumbnailError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ThumbnailError::Request(format!("HTTP client init: {}", e)))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl ThumbnailClient for HttpThumbnailClient {
    async fn request_thumbnail(
        &self,
        asset_url: &str,
        entity_id: Uuid,
    ) -> Result<(), ThumbnailError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "asset_url": asset_url,
                "entity_id": entity_id,
            }))
            .send()
            .await
            .map_err(|e| ThumbnailError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ThumbnailError::Request(format!(
                "thumbnailer returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Thumbnailer that does nothing; for tests and deployments without a
/// post-processor.
pub struct NoOpThumbnailer;

#[async_trait]
impl ThumbnailClient for NoOpThumbnailer {
    async fn request_thumbnail(
        &self,
        _asset_url: &str,
        _entity_id: Uuid,
    ) -> Result<(), ThumbnailError> {
        Ok(())
    }
}
