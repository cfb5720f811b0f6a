//! PartsBay Media Core Library
//!
//! This crate provides the domain models, configuration, device-capability
//! probing, and network profiling shared by the upload pipeline crates.

pub mod capabilities;
pub mod config;
pub mod models;
pub mod network;

// Re-export commonly used types
pub use capabilities::{capabilities, DeviceCapabilities};
pub use config::{BandBudgets, BandThresholds, PipelineConfig};
pub use models::compression::{CompressionBudget, CompressionMethod, CompressionReport};
pub use models::network::{ConnectionClass, NetworkProfile};
pub use models::signing::{UploadAuthorization, UploadFileMeta};
pub use models::snapshot::{ItemSnapshot, QueueSnapshot, UploadStatus};
pub use models::upload_item::{SourceFile, UploadItem, UploadStage};
pub use network::{NetworkProfiler, ProfilerConfig};
