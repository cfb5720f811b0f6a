//! PartsBay Media Pipeline Library
//!
//! The adaptive upload pipeline's orchestration layer: takes a batch of
//! user-selected images, compresses each against the current network
//! conditions, uploads with bounded concurrency and progress feedback, and
//! publishes a live queue of per-file states to subscribers.
//!
//! Composition example:
//!
//! ```no_run
//! use std::sync::Arc;
//! use pbmedia_core::{capabilities, NetworkProfiler, PipelineConfig, ProfilerConfig};
//! use pbmedia_processing::CompressionEngine;
//! use pbmedia_transport::{
//!     HttpBackend, HttpSigningClient, HttpThumbnailClient, RetryingTransport,
//! };
//! use pbmedia_pipeline::UploadQueueManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::from_env();
//! let caps = capabilities();
//! let profiler = Arc::new(NetworkProfiler::new(ProfilerConfig::from_pipeline(&config)));
//! let engine = Arc::new(CompressionEngine::new(&caps));
//! let signer = Arc::new(HttpSigningClient::new(
//!     "https://api.partsbay.ae/v1/uploads/sign".to_string(),
//!     None,
//! )?);
//! let transport = Arc::new(RetryingTransport::from_config(
//!     HttpBackend::from_config(&config)?,
//!     &config,
//!     profiler.clone(),
//! ));
//! let thumbnailer = Arc::new(HttpThumbnailClient::new(
//!     "https://api.partsbay.ae/v1/thumbnails".to_string(),
//! )?);
//!
//! let manager = UploadQueueManager::new(
//!     config, caps, profiler, engine, signer, transport, thumbnailer,
//! );
//! let _guard = manager.subscribe(Arc::new(|snapshot| {
//!     println!("{}/{} done", snapshot.completed_count, snapshot.total_count);
//! }));
//! # Ok(())
//! # }
//! ```

pub mod queue;
pub mod subscribers;
pub mod telemetry;

pub use queue::{EnqueueReceipt, RejectedFile, UploadQueueManager};
pub use subscribers::{SnapshotCallback, SubscriptionGuard};
pub use telemetry::init_telemetry;
