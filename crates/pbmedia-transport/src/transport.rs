//! Upload transport abstraction
//!
//! [`TransportBackend`] is one delivery attempt against a signed
//! destination; [`RetryingTransport`] wraps any backend with the retry
//! policy, progress accounting, and the profiler feedback loop, and is what
//! the queue manager consumes as [`UploadTransport`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use pbmedia_core::{NetworkProfiler, PipelineConfig, UploadAuthorization};

use crate::error::TransportError;
use crate::retry::BackoffPolicy;
use crate::throttle::{ProgressFn, ThrottledProgress};

/// A stored asset, as reported by the destination.
#[derive(Debug, Clone)]
pub struct UploadedAsset {
    /// Canonical URL of the stored object.
    pub url: String,
    pub bytes_sent: u64,
}

/// One delivery attempt. Implementations report raw byte progress through
/// the supplied throttle and stop promptly when the token fires.
#[async_trait]
pub trait TransportBackend: Send + Sync {
    async fn send(
        &self,
        payload: Bytes,
        authorization: &UploadAuthorization,
        progress: Arc<ThrottledProgress>,
        cancel: &CancellationToken,
    ) -> Result<UploadedAsset, TransportError>;
}

/// The full upload operation as the queue manager sees it: retries included,
/// progress throttled, cancellation cooperative.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn upload(
        &self,
        payload: Bytes,
        authorization: &UploadAuthorization,
        on_progress: ProgressFn,
        cancel: &CancellationToken,
    ) -> Result<UploadedAsset, TransportError>;
}

/// Wraps a backend with the centralized backoff policy and reports every
/// attempt's bytes/elapsed to the network profiler, closing the adaptive
/// feedback loop.
pub struct RetryingTransport<B> {
    backend: B,
    policy: BackoffPolicy,
    profiler: Arc<NetworkProfiler>,
    throttle_interval: Duration,
    retry_predicate: fn(&TransportError) -> bool,
}

impl<B: TransportBackend> RetryingTransport<B> {
    pub fn new(backend: B, policy: BackoffPolicy, profiler: Arc<NetworkProfiler>) -> Self {
        Self {
            backend,
            policy,
            profiler,
            throttle_interval: Duration::from_millis(
                crate::throttle::DEFAULT_THROTTLE_INTERVAL_MS,
            ),
            retry_predicate: TransportError::is_transient,
        }
    }

    pub fn from_config(backend: B, config: &PipelineConfig, profiler: Arc<NetworkProfiler>) -> Self {
        Self {
            backend,
            policy: BackoffPolicy::from_config(config),
            profiler,
            throttle_interval: Duration::from_millis(config.progress_throttle_ms),
            retry_predicate: TransportError::is_transient,
        }
    }
}

#[async_trait]
impl<B: TransportBackend> UploadTransport for RetryingTransport<B> {
    async fn upload(
        &self,
        payload: Bytes,
        authorization: &UploadAuthorization,
        on_progress: ProgressFn,
        cancel: &CancellationToken,
    ) -> Result<UploadedAsset, TransportError> {
        let mut retries = 0u32;
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            // Track bytes handed to the backend so failed attempts can still
            // feed the profiler.
            let sent = Arc::new(AtomicU64::new(0));
            let counting: ProgressFn = {
                let sent = sent.clone();
                let outer = on_progress.clone();
                Arc::new(move |loaded, total| {
                    sent.fetch_max(loaded, Ordering::Relaxed);
                    outer(loaded, total);
                })
            };
            let throttled = Arc::new(ThrottledProgress::new(self.throttle_interval, counting));

            let started = Instant::now();
            let result = self
                .backend
                .send(payload.clone(), authorization, throttled, cancel)
                .await;
            let elapsed = started.elapsed();

            match result {
                Ok(asset) => {
                    self.profiler.record_transfer(asset.bytes_sent, elapsed);
                    return Ok(asset);
                }
                Err(TransportError::Cancelled) => return Err(TransportError::Cancelled),
                Err(err) if (self.retry_predicate)(&err) => {
                    let bytes = sent.load(Ordering::Relaxed);
                    if bytes > 0 {
                        self.profiler.record_transfer(bytes, elapsed);
                    }

                    if !self.policy.allows_retry(retries) {
                        return Err(TransportError::RetriesExhausted {
                            attempts,
                            last_error: err.to_string(),
                        });
                    }
                    retries += 1;
                    let delay = self.policy.delay_for(retries);
                    tracing::warn!(
                        error = %err,
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        "Transient upload failure, backing off"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                    }
                }
                Err(err) => {
                    let bytes = sent.load(Ordering::Relaxed);
                    if bytes > 0 {
                        self.profiler.record_transfer(bytes, elapsed);
                    }
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pbmedia_core::ProfilerConfig;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct ScriptedBackend {
        outcomes: Mutex<VecDeque<Result<UploadedAsset, TransportError>>>,
        calls: AtomicU32,
    }

    impl ScriptedBackend {
        fn new(outcomes: Vec<Result<UploadedAsset, TransportError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn always_transient() -> Self {
            Self {
                outcomes: Mutex::new(VecDeque::new()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl TransportBackend for ScriptedBackend {
        async fn send(
            &self,
            payload: Bytes,
            _authorization: &UploadAuthorization,
            progress: Arc<ThrottledProgress>,
            _cancel: &CancellationToken,
        ) -> Result<UploadedAsset, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            progress.report(payload.len() as u64 / 2, payload.len() as u64);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Transient("simulated timeout".to_string())))
        }
    }

    fn authorization() -> UploadAuthorization {
        UploadAuthorization {
            upload_id: Uuid::new_v4(),
            destination_url: "https://storage.example/listings/a.jpg".to_string(),
            headers: vec![],
            expires_at: Utc::now() + chrono::Duration::minutes(5),
        }
    }

    fn profiler() -> Arc<NetworkProfiler> {
        Arc::new(NetworkProfiler::new(ProfilerConfig::default()))
    }

    fn no_progress() -> ProgressFn {
        Arc::new(|_, _| {})
    }

    fn ok_asset() -> Result<UploadedAsset, TransportError> {
        Ok(UploadedAsset {
            url: "https://cdn.example/a.jpg".to_string(),
            bytes_sent: 1024,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_retries_with_backoff_sequence() {
        let transport = RetryingTransport::new(
            ScriptedBackend::always_transient(),
            BackoffPolicy::default(),
            profiler(),
        );

        let started = tokio::time::Instant::now();
        let result = transport
            .upload(
                Bytes::from(vec![0u8; 1024]),
                &authorization(),
                no_progress(),
                &CancellationToken::new(),
            )
            .await;
        let waited = started.elapsed();

        match result {
            Err(TransportError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 4),
            other => panic!("expected retries exhausted, got {:?}", other.map(|a| a.url)),
        }
        // 1000 + 2000 + 4000 ms of backoff between the four attempts.
        assert_eq!(waited, Duration::from_millis(7000));
        assert_eq!(transport.backend.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let transport = RetryingTransport::new(
            ScriptedBackend::new(vec![
                Err(TransportError::Transient("reset".to_string())),
                Err(TransportError::Transient("reset".to_string())),
                ok_asset(),
            ]),
            BackoffPolicy::default(),
            profiler(),
        );

        let asset = transport
            .upload(
                Bytes::from(vec![0u8; 1024]),
                &authorization(),
                no_progress(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(asset.url, "https://cdn.example/a.jpg");
        assert_eq!(transport.backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let transport = RetryingTransport::new(
            ScriptedBackend::new(vec![Err(TransportError::Fatal("403 Forbidden".to_string()))]),
            BackoffPolicy::default(),
            profiler(),
        );

        let result = transport
            .upload(
                Bytes::from(vec![0u8; 64]),
                &authorization(),
                no_progress(),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(TransportError::Fatal(_))));
        assert_eq!(transport.backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_backoff() {
        let cancel = CancellationToken::new();
        let transport = RetryingTransport::new(
            ScriptedBackend::always_transient(),
            BackoffPolicy::default(),
            profiler(),
        );

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            cancel_clone.cancel();
        });

        let result = transport
            .upload(
                Bytes::from(vec![0u8; 64]),
                &authorization(),
                no_progress(),
                &cancel,
            )
            .await;
        assert!(matches!(result, Err(TransportError::Cancelled)));
    }

    #[tokio::test]
    async fn test_successful_upload_feeds_profiler() {
        let profiler = profiler();
        let transport = RetryingTransport::new(
            ScriptedBackend::new(vec![Ok(UploadedAsset {
                url: "https://cdn.example/a.jpg".to_string(),
                bytes_sent: 10 * 1024,
            })]),
            BackoffPolicy::default(),
            profiler.clone(),
        );

        transport
            .upload(
                Bytes::from(vec![0u8; 10 * 1024]),
                &authorization(),
                no_progress(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        // A sample was recorded; with a ~instant transfer the estimate is
        // far above the no-sample default.
        let profile = profiler.profile();
        assert!(
            profile.bytes_per_second
                > pbmedia_core::ConnectionClass::Medium.assumed_bytes_per_second()
        );
    }
}
