//! HTTP upload backend.
//!
//! Streams the compressed payload to the signed destination with a PUT,
//! counting bytes as the connection consumes them so progress reporting and
//! the stall watchdog both see real transfer activity. One call is one
//! attempt; retries live in [`RetryingTransport`](crate::RetryingTransport).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::stream;
use reqwest::header::CONTENT_LENGTH;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use pbmedia_core::{PipelineConfig, UploadAuthorization};

use crate::error::TransportError;
use crate::throttle::ThrottledProgress;
use crate::transport::{TransportBackend, UploadedAsset};

/// Payload is handed to the connection in slices of this size.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;
/// How often the stall watchdog re-checks for progress.
const WATCHDOG_TICK: Duration = Duration::from_millis(500);

pub struct HttpBackend {
    client: reqwest::Client,
    stall_timeout: Duration,
}

impl HttpBackend {
    pub fn new(stall_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Fatal(format!("HTTP client init: {}", e)))?;
        Ok(Self {
            client,
            stall_timeout,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, TransportError> {
        Self::new(Duration::from_secs(config.upload_stall_timeout_secs))
    }

    /// Remote status codes mapped onto the transport error taxonomy.
    fn classify_status(status: StatusCode) -> TransportError {
        if status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
        {
            TransportError::Transient(format!("destination returned {}", status))
        } else {
            TransportError::Fatal(format!("destination returned {}", status))
        }
    }

    /// Canonical object URL for a signed destination: the path without the
    /// signature query.
    fn public_url(destination_url: &str) -> String {
        destination_url
            .split('?')
            .next()
            .unwrap_or(destination_url)
            .to_string()
    }
}

fn split_chunks(payload: &Bytes) -> Vec<Bytes> {
    let mut chunks = Vec::with_capacity(payload.len() / UPLOAD_CHUNK_BYTES + 1);
    let mut offset = 0;
    while offset < payload.len() {
        let end = (offset + UPLOAD_CHUNK_BYTES).min(payload.len());
        chunks.push(payload.slice(offset..end));
        offset = end;
    }
    chunks
}

#[async_trait]
impl TransportBackend for HttpBackend {
    async fn send(
        &self,
        payload: Bytes,
        authorization: &UploadAuthorization,
        progress: Arc<ThrottledProgress>,
        cancel: &CancellationToken,
    ) -> Result<UploadedAsset, TransportError> {
        if authorization.is_expired(Utc::now()) {
            return Err(TransportError::Fatal(
                "upload authorization expired".to_string(),
            ));
        }

        let total = payload.len() as u64;
        let sent = Arc::new(AtomicU64::new(0));
        let last_activity = Arc::new(Mutex::new(Instant::now()));

        let body_stream = {
            let sent = sent.clone();
            let last_activity = last_activity.clone();
            let progress = progress.clone();
            stream::iter(split_chunks(&payload).into_iter().map(move |chunk| {
                let loaded = sent.fetch_add(chunk.len() as u64, Ordering::Relaxed)
                    + chunk.len() as u64;
                *last_activity.lock().expect("activity clock poisoned") = Instant::now();
                progress.report(loaded, total);
                Ok::<Bytes, std::io::Error>(chunk)
            }))
        };

        let mut request = self
            .client
            .put(&authorization.destination_url)
            .header(CONTENT_LENGTH, total);
        for (name, value) in &authorization.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let send = request.body(reqwest::Body::wrap_stream(body_stream)).send();

        let stall_timeout = self.stall_timeout;
        let watchdog = {
            let last_activity = last_activity.clone();
            async move {
                loop {
                    tokio::time::sleep(WATCHDOG_TICK).await;
                    let idle = last_activity.lock().expect("activity clock poisoned").elapsed();
                    if idle >= stall_timeout {
                        return idle;
                    }
                }
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            idle = watchdog => Err(TransportError::Transient(format!(
                "no upload progress for {}s",
                idle.as_secs()
            ))),
            result = send => match result {
                Ok(response) if response.status().is_success() => {
                    progress.report(total, total);
                    tracing::debug!(
                        upload_id = %authorization.upload_id,
                        bytes = total,
                        "Upload attempt delivered"
                    );
                    Ok(UploadedAsset {
                        url: Self::public_url(&authorization.destination_url),
                        bytes_sent: total,
                    })
                }
                Ok(response) => Err(Self::classify_status(response.status())),
                Err(e) if e.is_timeout() || e.is_connect() => {
                    Err(TransportError::Transient(e.to_string()))
                }
                Err(e) => Err(TransportError::Transient(format!("request failed: {}", e))),
            },
        }
    }
}
