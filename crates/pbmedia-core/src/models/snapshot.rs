//! Immutable queue snapshots delivered to subscribers.
//!
//! The queue manager publishes a fresh [`QueueSnapshot`] after every state
//! transition. Snapshots are owned values: subscribers can hold or serialize
//! them without touching pipeline internals.

use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use super::compression::CompressionReport;
use super::upload_item::{UploadItem, UploadStage};

/// Flattened item status, stable across the UI boundary.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Compressing,
    Signing,
    Uploading,
    Success,
    Error,
    Cancelled,
}

impl Display for UploadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadStatus::Pending => write!(f, "pending"),
            UploadStatus::Compressing => write!(f, "compressing"),
            UploadStatus::Signing => write!(f, "signing"),
            UploadStatus::Uploading => write!(f, "uploading"),
            UploadStatus::Success => write!(f, "success"),
            UploadStatus::Error => write!(f, "error"),
            UploadStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl From<&UploadStage> for UploadStatus {
    fn from(stage: &UploadStage) -> Self {
        match stage {
            UploadStage::Pending => UploadStatus::Pending,
            UploadStage::Compressing => UploadStatus::Compressing,
            UploadStage::Signing => UploadStatus::Signing,
            UploadStage::Uploading => UploadStatus::Uploading,
            UploadStage::Succeeded { .. } => UploadStatus::Success,
            UploadStage::Failed { .. } => UploadStatus::Error,
            UploadStage::Cancelled => UploadStatus::Cancelled,
        }
    }
}

/// One item as seen by the UI.
#[derive(Debug, Clone, Serialize)]
pub struct ItemSnapshot {
    pub id: Uuid,
    pub file_name: String,
    pub file_size_bytes: u64,
    pub status: UploadStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&UploadItem> for ItemSnapshot {
    fn from(item: &UploadItem) -> Self {
        Self {
            id: item.id,
            file_name: item.source.file_name.clone(),
            file_size_bytes: item.source.size_bytes(),
            status: UploadStatus::from(&item.stage),
            progress: item.progress,
            compression: item.compression.clone(),
            final_url: item.final_url().map(str::to_string),
            error: item.error_reason().map(str::to_string),
        }
    }
}

/// Ordered view of the whole queue plus derived aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    pub items: Vec<ItemSnapshot>,
    /// Items that finished with a stored asset.
    pub completed_count: usize,
    pub total_count: usize,
    /// True while any item still has work ahead of it.
    pub is_uploading: bool,
}

impl QueueSnapshot {
    pub fn from_items(items: &[UploadItem]) -> Self {
        let snapshots: Vec<ItemSnapshot> = items.iter().map(ItemSnapshot::from).collect();
        let completed_count = snapshots
            .iter()
            .filter(|s| s.status == UploadStatus::Success)
            .count();
        let is_uploading = items.iter().any(|i| !i.is_terminal());
        Self {
            total_count: snapshots.len(),
            completed_count,
            is_uploading,
            items: snapshots,
        }
    }

    pub fn counts_by_status(&self) -> [(UploadStatus, usize); 7] {
        let count = |status: UploadStatus| self.items.iter().filter(|s| s.status == status).count();
        [
            (UploadStatus::Pending, count(UploadStatus::Pending)),
            (UploadStatus::Compressing, count(UploadStatus::Compressing)),
            (UploadStatus::Signing, count(UploadStatus::Signing)),
            (UploadStatus::Uploading, count(UploadStatus::Uploading)),
            (UploadStatus::Success, count(UploadStatus::Success)),
            (UploadStatus::Error, count(UploadStatus::Error)),
            (UploadStatus::Cancelled, count(UploadStatus::Cancelled)),
        ]
    }
}
