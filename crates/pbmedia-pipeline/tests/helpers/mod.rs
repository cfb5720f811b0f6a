#![allow(dead_code)]

//! Shared fixtures and collaborator doubles for pipeline integration tests.

use std::collections::VecDeque;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use pbmedia_core::{
    DeviceCapabilities, NetworkProfiler, PipelineConfig, ProfilerConfig, QueueSnapshot,
    SourceFile, UploadAuthorization,
};
use pbmedia_pipeline::UploadQueueManager;
use pbmedia_processing::CompressionEngine;
use pbmedia_transport::{
    LocalBackend, RetryingTransport, SigningClient, StaticSigner, ThrottledProgress,
    ThumbnailClient, ThumbnailError, TransportBackend, TransportError, UploadTransport,
    UploadedAsset,
};

// ---------------------------------------------------------------------------
// Image fixtures

pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x / 2 + y / 2) % 256) as u8])
    }))
}

pub fn gradient_png(width: u32, height: u32) -> Bytes {
    let mut buffer = Vec::new();
    gradient_image(width, height)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    Bytes::from(buffer)
}

pub fn gradient_jpeg(width: u32, height: u32) -> Bytes {
    let mut buffer = Vec::new();
    gradient_image(width, height)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
        .unwrap();
    Bytes::from(buffer)
}

pub fn source(name: &str, content_type: &str, data: Bytes) -> SourceFile {
    SourceFile {
        file_name: name.to_string(),
        content_type: content_type.to_string(),
        data,
        entity_id: Uuid::new_v4(),
    }
}

// ---------------------------------------------------------------------------
// Pipeline assembly

pub struct TestPipeline {
    pub manager: UploadQueueManager,
    pub profiler: Arc<NetworkProfiler>,
}

/// Capabilities used by tests: inline compression, full concurrency.
pub fn test_capabilities() -> DeviceCapabilities {
    DeviceCapabilities {
        offload_available: false,
        low_end_device: false,
    }
}

pub fn pipeline_with(
    config: PipelineConfig,
    transport: Arc<dyn UploadTransport>,
    thumbnailer: Arc<dyn ThumbnailClient>,
    profiler: Arc<NetworkProfiler>,
) -> TestPipeline {
    let caps = test_capabilities();
    let manager = UploadQueueManager::new(
        config,
        caps,
        profiler.clone(),
        Arc::new(CompressionEngine::new(&caps)),
        Arc::new(StaticSigner::new("mem://uploads".to_string())),
        transport,
        thumbnailer,
    );
    TestPipeline { manager, profiler }
}

/// Pipeline storing uploads under `dir` via the local backend.
pub fn local_pipeline(dir: &Path, config: PipelineConfig) -> TestPipeline {
    local_pipeline_with_thumbnailer(dir, config, Arc::new(CountingThumbnailer::default()))
}

pub fn local_pipeline_with_thumbnailer(
    dir: &Path,
    config: PipelineConfig,
    thumbnailer: Arc<dyn ThumbnailClient>,
) -> TestPipeline {
    let profiler = Arc::new(NetworkProfiler::new(ProfilerConfig::from_pipeline(&config)));
    let backend = LocalBackend::new(dir, "http://localhost/media".to_string())
        .with_pace(Duration::from_millis(2));
    let transport = Arc::new(RetryingTransport::from_config(
        backend,
        &config,
        profiler.clone(),
    ));
    pipeline_with(config, transport, thumbnailer, profiler)
}

// ---------------------------------------------------------------------------
// Transport doubles

#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Deliver,
    Transient,
    Fatal,
}

/// Backend that follows a script of outcomes, then repeats a fallback.
pub struct ScriptedBackend {
    pub calls: Arc<AtomicU32>,
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Outcome>, fallback: Outcome) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            script: Mutex::new(script.into()),
            fallback,
        }
    }
}

#[async_trait]
impl TransportBackend for ScriptedBackend {
    async fn send(
        &self,
        payload: Bytes,
        authorization: &UploadAuthorization,
        progress: Arc<ThrottledProgress>,
        _cancel: &CancellationToken,
    ) -> Result<UploadedAsset, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        match outcome {
            Outcome::Deliver => {
                let total = payload.len() as u64;
                progress.report(total, total);
                Ok(UploadedAsset {
                    url: authorization
                        .destination_url
                        .split('?')
                        .next()
                        .unwrap_or(&authorization.destination_url)
                        .to_string(),
                    bytes_sent: total,
                })
            }
            Outcome::Transient => Err(TransportError::Transient("simulated timeout".to_string())),
            Outcome::Fatal => Err(TransportError::Fatal("simulated 403".to_string())),
        }
    }
}

/// Backend that parks every attempt until released (or cancelled). Lets
/// tests observe mid-`uploading` states deterministically.
pub struct GatedBackend {
    pub entered: Arc<AtomicBool>,
    pub release: CancellationToken,
}

impl GatedBackend {
    pub fn new() -> Self {
        Self {
            entered: Arc::new(AtomicBool::new(false)),
            release: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl TransportBackend for GatedBackend {
    async fn send(
        &self,
        payload: Bytes,
        authorization: &UploadAuthorization,
        _progress: Arc<ThrottledProgress>,
        cancel: &CancellationToken,
    ) -> Result<UploadedAsset, TransportError> {
        self.entered.store(true, Ordering::SeqCst);
        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            _ = self.release.cancelled() => Ok(UploadedAsset {
                url: authorization.destination_url.clone(),
                bytes_sent: payload.len() as u64,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Thumbnailer doubles

#[derive(Default)]
pub struct CountingThumbnailer {
    pub calls: Mutex<Vec<(String, Uuid)>>,
}

#[async_trait]
impl ThumbnailClient for CountingThumbnailer {
    async fn request_thumbnail(
        &self,
        asset_url: &str,
        entity_id: Uuid,
    ) -> Result<(), ThumbnailError> {
        self.calls
            .lock()
            .unwrap()
            .push((asset_url.to_string(), entity_id));
        Ok(())
    }
}

pub struct FailingThumbnailer;

#[async_trait]
impl ThumbnailClient for FailingThumbnailer {
    async fn request_thumbnail(
        &self,
        _asset_url: &str,
        _entity_id: Uuid,
    ) -> Result<(), ThumbnailError> {
        Err(ThumbnailError::Request("thumbnailer offline".to_string()))
    }
}

/// Signer that always denies, for authorization failure paths.
pub struct DenyingSigner;

#[async_trait]
impl SigningClient for DenyingSigner {
    async fn authorize_upload(
        &self,
        _meta: &pbmedia_core::UploadFileMeta,
    ) -> Result<UploadAuthorization, pbmedia_transport::AuthorizationError> {
        Err(pbmedia_transport::AuthorizationError::Denied(
            "session expired".to_string(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Waiting and observation

pub async fn wait_for(
    manager: &UploadQueueManager,
    predicate: impl Fn(&QueueSnapshot) -> bool,
) -> QueueSnapshot {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(60);
    loop {
        let snapshot = manager.snapshot();
        if predicate(&snapshot) {
            return snapshot;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("condition not reached before deadline: {:?}", snapshot);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until every item in a non-empty queue is terminal.
pub async fn wait_all_terminal(manager: &UploadQueueManager) -> QueueSnapshot {
    wait_for(manager, |s| s.total_count > 0 && !s.is_uploading).await
}

/// Collects every published snapshot for later inspection.
pub struct SnapshotLog {
    pub snapshots: Arc<Mutex<Vec<QueueSnapshot>>>,
}

impl SnapshotLog {
    pub fn attach(manager: &UploadQueueManager) -> (Self, pbmedia_pipeline::SubscriptionGuard) {
        let snapshots: Arc<Mutex<Vec<QueueSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = snapshots.clone();
        let guard = manager.subscribe(Arc::new(move |snapshot| {
            sink.lock().unwrap().push(snapshot.clone());
        }));
        (Self { snapshots }, guard)
    }

    pub fn max_active(&self) -> usize {
        self.snapshots
            .lock()
            .unwrap()
            .iter()
            .map(|s| {
                s.items
                    .iter()
                    .filter(|i| {
                        matches!(
                            i.status,
                            pbmedia_core::UploadStatus::Compressing
                                | pbmedia_core::UploadStatus::Signing
                                | pbmedia_core::UploadStatus::Uploading
                        )
                    })
                    .count()
            })
            .max()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }
}
