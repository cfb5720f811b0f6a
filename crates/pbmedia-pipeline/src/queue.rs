//! Upload queue manager: the orchestrating state machine.
//!
//! Owns the ordered list of upload items and is their sole mutator. Items
//! admitted from `pending` run compress → sign → upload under a
//! semaphore-enforced concurrency cap, FIFO by insertion order. Every state
//! transition republishes an immutable snapshot to subscribers; per-item
//! failures surface in the snapshot, never as exceptions across the
//! subscriber boundary.
//!
//! Construct one manager per composition root and share it by cloning; all
//! dependencies (profiler, engine, signer, transport, thumbnailer) are
//! injected. Must be created inside a Tokio runtime, which drives the item
//! tasks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use pbmedia_core::{
    DeviceCapabilities, NetworkProfiler, PipelineConfig, QueueSnapshot, SourceFile, UploadItem,
    UploadStage,
};
use pbmedia_processing::{CompressionEngine, MediaValidator, ValidationError};
use pbmedia_transport::{ProgressFn, SigningClient, ThumbnailClient, TransportError, UploadTransport};

use crate::subscribers::{SnapshotCallback, SubscriberRegistry, SubscriptionGuard};

/// A file turned away at enqueue time, with the reason shown to the caller.
#[derive(Debug, Clone)]
pub struct RejectedFile {
    pub file_name: String,
    pub reason: ValidationError,
}

/// Synchronous result of [`UploadQueueManager::enqueue`]: which files were
/// admitted (in input order) and which were rejected, individually.
#[derive(Debug, Default)]
pub struct EnqueueReceipt {
    pub accepted: Vec<Uuid>,
    pub rejected: Vec<RejectedFile>,
}

struct QueueState {
    items: Vec<UploadItem>,
    cancel_tokens: HashMap<Uuid, CancellationToken>,
}

struct Inner {
    config: PipelineConfig,
    validator: MediaValidator,
    state: Mutex<QueueState>,
    subscribers: Arc<SubscriberRegistry>,
    slots: Arc<Semaphore>,
    profiler: Arc<NetworkProfiler>,
    engine: Arc<CompressionEngine>,
    signer: Arc<dyn SigningClient>,
    transport: Arc<dyn UploadTransport>,
    thumbnailer: Arc<dyn ThumbnailClient>,
}

/// The upload pipeline's public surface.
#[derive(Clone)]
pub struct UploadQueueManager {
    inner: Arc<Inner>,
}

impl UploadQueueManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PipelineConfig,
        capabilities: DeviceCapabilities,
        profiler: Arc<NetworkProfiler>,
        engine: Arc<CompressionEngine>,
        signer: Arc<dyn SigningClient>,
        transport: Arc<dyn UploadTransport>,
        thumbnailer: Arc<dyn ThumbnailClient>,
    ) -> Self {
        let concurrency = config
            .concurrency_override
            .unwrap_or_else(|| capabilities.default_concurrency())
            .max(1);
        let validator = MediaValidator::new(
            config.max_file_size_bytes,
            config.allowed_content_type_prefix.clone(),
            config.allowed_extensions.clone(),
        );

        tracing::info!(
            concurrency = concurrency,
            max_file_size_bytes = config.max_file_size_bytes,
            low_end_device = capabilities.low_end_device,
            "Upload queue manager started"
        );

        Self {
            inner: Arc::new(Inner {
                config,
                validator,
                state: Mutex::new(QueueState {
                    items: Vec::new(),
                    cancel_tokens: HashMap::new(),
                }),
                subscribers: Arc::new(SubscriberRegistry::default()),
                slots: Arc::new(Semaphore::new(concurrency)),
                profiler,
                engine,
                signer,
                transport,
                thumbnailer,
            }),
        }
    }

    /// Validate and admit a batch of files. Invalid files are rejected
    /// individually and never create items; valid ones enter the queue as
    /// `pending` in input order and start as concurrency slots free up.
    pub fn enqueue(&self, files: Vec<SourceFile>) -> EnqueueReceipt {
        let mut receipt = EnqueueReceipt::default();
        let mut admitted = false;

        for file in files {
            match self.inner.validator.validate_all(
                &file.file_name,
                &file.content_type,
                file.data.len(),
            ) {
                Ok(()) => {
                    let item = UploadItem::new(file);
                    receipt.accepted.push(item.id);
                    self.inner
                        .state
                        .lock()
                        .expect("queue state poisoned")
                        .items
                        .push(item);
                    admitted = true;
                }
                Err(reason) => {
                    tracing::debug!(
                        file_name = %file.file_name,
                        reason = %reason,
                        "Rejected file at enqueue"
                    );
                    receipt.rejected.push(RejectedFile {
                        file_name: file.file_name,
                        reason,
                    });
                }
            }
        }

        if admitted {
            self.inner.publish();
            self.inner.schedule_pending();
        }
        receipt
    }

    /// Cancel one item. Non-terminal items transition to `cancelled`
    /// immediately; any in-flight work for them is signalled to stop
    /// cooperatively. Returns whether a cancellation happened.
    pub fn cancel(&self, id: Uuid) -> bool {
        let cancelled = {
            let mut state = self.inner.state.lock().expect("queue state poisoned");
            let state = &mut *state;
            match state.items.iter_mut().find(|i| i.id == id) {
                None => return false,
                Some(item) if item.is_terminal() => false,
                Some(item) => {
                    item.mark_cancelled();
                    if let Some(token) = state.cancel_tokens.get(&id) {
                        token.cancel();
                    }
                    true
                }
            }
        };

        if cancelled {
            tracing::info!(item_id = %id, "Upload cancelled by user");
            self.inner.publish();
        }
        cancelled
    }

    /// Cancel every non-terminal item ("stop all uploads").
    pub fn cancel_all(&self) -> usize {
        let cancelled = {
            let mut state = self.inner.state.lock().expect("queue state poisoned");
            let state = &mut *state;
            let mut cancelled = 0;
            let ids: Vec<Uuid> = state
                .items
                .iter()
                .filter(|i| !i.is_terminal())
                .map(|i| i.id)
                .collect();
            for id in ids {
                if let Some(item) = state.items.iter_mut().find(|i| i.id == id) {
                    item.mark_cancelled();
                    cancelled += 1;
                }
                if let Some(token) = state.cancel_tokens.get(&id) {
                    token.cancel();
                }
            }
            cancelled
        };

        if cancelled > 0 {
            tracing::info!(count = cancelled, "Cancelled all active uploads");
            self.inner.publish();
        }
        cancelled
    }

    /// Re-queue a failed item. Only legal from `error`; anything else is a
    /// no-op. Progress resets to zero and the item re-enters `pending`.
    pub fn retry(&self, id: Uuid) -> bool {
        let retried = {
            let mut state = self.inner.state.lock().expect("queue state poisoned");
            state
                .items
                .iter_mut()
                .find(|i| i.id == id)
                .map(|item| item.reset_for_retry())
                .unwrap_or(false)
        };

        if retried {
            tracing::info!(item_id = %id, "Retrying failed upload");
            self.inner.publish();
            self.inner.schedule_pending();
        }
        retried
    }

    /// Drop items that finished as `success` or `cancelled`. Failed items
    /// stay visible until explicitly removed, so errors are never silently
    /// discarded.
    pub fn clear_completed(&self) -> usize {
        let removed = {
            let mut state = self.inner.state.lock().expect("queue state poisoned");
            let before = state.items.len();
            state.items.retain(|i| {
                !matches!(
                    i.stage,
                    UploadStage::Succeeded { .. } | UploadStage::Cancelled
                )
            });
            before - state.items.len()
        };

        if removed > 0 {
            self.inner.publish();
        }
        removed
    }

    /// Remove one terminal item (including failed ones the user dismissed).
    /// Items still in flight must be cancelled first.
    pub fn remove(&self, id: Uuid) -> bool {
        let removed = {
            let mut state = self.inner.state.lock().expect("queue state poisoned");
            let index = state
                .items
                .iter()
                .position(|i| i.id == id && i.is_terminal());
            match index {
                Some(index) => {
                    state.items.remove(index);
                    true
                }
                None => false,
            }
        };

        if removed {
            self.inner.publish();
        }
        removed
    }

    /// Current queue state as an immutable snapshot.
    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.inner.state.lock().expect("queue state poisoned");
        QueueSnapshot::from_items(&state.items)
    }

    /// Register a snapshot callback, invoked after every state transition.
    /// The returned guard deregisters on drop.
    pub fn subscribe(&self, callback: SnapshotCallback) -> SubscriptionGuard {
        let id = self.inner.subscribers.register(callback);
        SubscriptionGuard::new(id, Arc::downgrade(&self.inner.subscribers))
    }
}

impl Inner {
    fn publish(&self) {
        let snapshot = {
            let state = self.state.lock().expect("queue state poisoned");
            QueueSnapshot::from_items(&state.items)
        };
        self.subscribers.notify(&snapshot);
    }

    /// Admit pending items FIFO while concurrency slots are free. Dequeued
    /// items transition to `compressing` before their task spawns, so one
    /// item is never dispatched twice.
    fn schedule_pending(self: &Arc<Self>) {
        loop {
            let permit = match self.slots.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let dispatched = {
                let mut state = self.state.lock().expect("queue state poisoned");
                let state = &mut *state;
                match state
                    .items
                    .iter_mut()
                    .find(|i| i.stage == UploadStage::Pending)
                {
                    Some(item) => {
                        item.mark_compressing();
                        let id = item.id;
                        let token = CancellationToken::new();
                        state.cancel_tokens.insert(id, token.clone());
                        Some((id, token))
                    }
                    None => None,
                }
            };

            match dispatched {
                Some((id, token)) => {
                    self.publish();
                    let inner = self.clone();
                    tokio::spawn(async move {
                        drive_item(inner, id, token, permit).await;
                    });
                }
                None => {
                    drop(permit);
                    break;
                }
            }
        }
    }

    fn stage_of(&self, id: Uuid) -> Option<UploadStage> {
        let state = self.state.lock().expect("queue state poisoned");
        state.items.iter().find(|i| i.id == id).map(|i| i.stage.clone())
    }

    fn with_item(&self, id: Uuid, apply: impl FnOnce(&mut UploadItem)) {
        {
            let mut state = self.state.lock().expect("queue state poisoned");
            if let Some(item) = state.items.iter_mut().find(|i| i.id == id) {
                apply(item);
            }
        }
        self.publish();
    }

    fn fail_item(&self, id: Uuid, reason: String) {
        tracing::warn!(item_id = %id, reason = %reason, "Upload item failed");
        self.with_item(id, |item| item.mark_failed(reason));
    }
}

/// Drive one item through compress → sign → upload, then free its slot and
/// pull the next pending item.
async fn drive_item(
    inner: Arc<Inner>,
    id: Uuid,
    token: CancellationToken,
    permit: OwnedSemaphorePermit,
) {
    run_item(&inner, id, &token).await;

    {
        let mut state = inner.state.lock().expect("queue state poisoned");
        state.cancel_tokens.remove(&id);
    }
    drop(permit);
    inner.schedule_pending();
}

async fn run_item(inner: &Arc<Inner>, id: Uuid, token: &CancellationToken) {
    // The item may have been cancelled between dispatch and now.
    let source = {
        let state = inner.state.lock().expect("queue state poisoned");
        match state.items.iter().find(|i| i.id == id) {
            Some(item) if item.stage == UploadStage::Compressing => item.source.clone(),
            _ => return,
        }
    };

    // Compress against the budget for the current network class.
    let profile = inner.profiler.profile();
    let budget = inner.config.budget_for(profile.class);
    tracing::debug!(
        item_id = %id,
        file_name = %source.file_name,
        class = %profile.class,
        target_bytes = budget.max_bytes,
        "Compressing upload"
    );

    let compressed = tokio::select! {
        _ = token.cancelled() => {
            inner.with_item(id, |item| item.mark_cancelled());
            return;
        }
        result = inner.engine.compress(source.data.clone(), budget) => match result {
            Ok(compressed) => compressed,
            Err(e) => {
                inner.fail_item(id, e.to_string());
                return;
            }
        }
    };

    inner.with_item(id, |item| {
        item.set_compression(compressed.report.clone());
        item.mark_signing();
    });
    if !matches!(inner.stage_of(id), Some(UploadStage::Signing)) {
        return;
    }

    // Obtain upload authorization.
    let meta = source.meta();
    let authorization = tokio::select! {
        _ = token.cancelled() => {
            inner.with_item(id, |item| item.mark_cancelled());
            return;
        }
        result = inner.signer.authorize_upload(&meta) => match result {
            Ok(authorization) => authorization,
            Err(e) => {
                inner.fail_item(id, e.to_string());
                return;
            }
        }
    };

    inner.with_item(id, |item| item.mark_uploading());
    if !matches!(inner.stage_of(id), Some(UploadStage::Uploading)) {
        return;
    }

    // Upload; the transport throttles progress and retries transient
    // failures internally.
    let progress: ProgressFn = {
        let inner = inner.clone();
        Arc::new(move |loaded, total| {
            inner.with_item(id, |item| {
                if item.stage == UploadStage::Uploading {
                    item.advance_progress(UploadItem::upload_progress(loaded, total));
                }
            });
        })
    };

    let result = inner
        .transport
        .upload(compressed.data.clone(), &authorization, progress, token)
        .await;

    match result {
        Ok(asset) => {
            tracing::info!(
                item_id = %id,
                url = %asset.url,
                bytes = asset.bytes_sent,
                "Upload completed"
            );
            inner.with_item(id, |item| item.mark_succeeded(asset.url.clone()));

            // Best-effort thumbnail generation; never affects the item.
            let thumbnailer = inner.thumbnailer.clone();
            let url = asset.url.clone();
            let entity_id = source.entity_id;
            tokio::spawn(async move {
                if let Err(e) = thumbnailer.request_thumbnail(&url, entity_id).await {
                    tracing::warn!(
                        entity_id = %entity_id,
                        error = %e,
                        "Thumbnail request failed"
                    );
                }
            });
        }
        Err(TransportError::Cancelled) => {
            inner.with_item(id, |item| item.mark_cancelled());
        }
        Err(e) => {
            inner.fail_item(id, e.to_string());
        }
    }
}
