//! Local filesystem upload backend.
//!
//! Stores payloads under a local directory and serves URLs from a configured
//! base. Used by tests and local development; the contract (progress,
//! cancellation, chunked delivery) matches the HTTP backend so the pipeline
//! behaves identically against either.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use pbmedia_core::UploadAuthorization;

use crate::error::TransportError;
use crate::throttle::ThrottledProgress;
use crate::transport::{TransportBackend, UploadedAsset};

const WRITE_CHUNK_BYTES: usize = 64 * 1024;

pub struct LocalBackend {
    root: PathBuf,
    base_url: String,
    /// Optional delay per written chunk; lets tests observe mid-transfer
    /// states deterministically.
    pace: Option<Duration>,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>, base_url: String) -> Self {
        Self {
            root: root.into(),
            base_url,
            pace: None,
        }
    }

    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = Some(pace);
        self
    }

    /// Object name for a signed destination: last path segment, signature
    /// query stripped.
    fn object_name(destination_url: &str) -> String {
        let path = destination_url.split('?').next().unwrap_or(destination_url);
        path.rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("upload.bin")
            .to_string()
    }

    async fn cleanup_partial(path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial upload");
        }
    }
}

#[async_trait]
impl TransportBackend for LocalBackend {
    async fn send(
        &self,
        payload: Bytes,
        authorization: &UploadAuthorization,
        progress: Arc<ThrottledProgress>,
        cancel: &CancellationToken,
    ) -> Result<UploadedAsset, TransportError> {
        let name = Self::object_name(&authorization.destination_url);
        let path = self.root.join(&name);
        let total = payload.len() as u64;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| TransportError::Fatal(format!("storage root unavailable: {}", e)))?;

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| TransportError::Transient(format!("create failed: {}", e)))?;

        let mut written: u64 = 0;
        for chunk in payload.chunks(WRITE_CHUNK_BYTES) {
            if cancel.is_cancelled() {
                drop(file);
                Self::cleanup_partial(&path).await;
                return Err(TransportError::Cancelled);
            }
            file.write_all(chunk)
                .await
                .map_err(|e| TransportError::Transient(format!("write failed: {}", e)))?;
            written += chunk.len() as u64;
            progress.report(written, total);

            if let Some(pace) = self.pace {
                tokio::time::sleep(pace).await;
            }
        }
        file.flush()
            .await
            .map_err(|e| TransportError::Transient(format!("flush failed: {}", e)))?;

        tracing::debug!(
            upload_id = %authorization.upload_id,
            path = %path.display(),
            bytes = total,
            "Stored upload locally"
        );

        Ok(UploadedAsset {
            url: format!("{}/{}", self.base_url.trim_end_matches('/'), name),
            bytes_sent: total,
        })
    }
}
