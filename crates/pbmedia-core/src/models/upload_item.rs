use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::compression::CompressionReport;
use super::signing::UploadFileMeta;

/// Progress reached once compression has finished.
pub const PROGRESS_COMPRESSED: u8 = 25;
/// Progress reached once an upload authorization has been obtained.
pub const PROGRESS_SIGNED: u8 = 30;

/// The file a caller handed to the pipeline, immutable for the item's lifetime.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
    /// Owning marketplace entity; forwarded to the thumbnail post-processor.
    pub entity_id: Uuid,
}

impl SourceFile {
    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn meta(&self) -> UploadFileMeta {
        UploadFileMeta {
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
            size_bytes: self.size_bytes(),
            entity_id: self.entity_id,
        }
    }
}

/// Stage of one item's journey through the pipeline.
///
/// Terminal outcomes carry their payload in the variant itself: a final URL
/// exists exactly when the item succeeded, a failure reason exactly when it
/// failed. State and payload cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStage {
    Pending,
    Compressing,
    Signing,
    Uploading,
    Succeeded { final_url: String },
    Failed { reason: String },
    Cancelled,
}

impl UploadStage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadStage::Succeeded { .. } | UploadStage::Failed { .. } | UploadStage::Cancelled
        )
    }

    /// Active stages count against the concurrency cap.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            UploadStage::Compressing | UploadStage::Signing | UploadStage::Uploading
        )
    }
}

/// One file's tracked state through the pipeline.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub id: Uuid,
    pub source: SourceFile,
    pub stage: UploadStage,
    /// Overall percentage, 0-100, monotonically non-decreasing within a
    /// stage; resets only on retry.
    pub progress: u8,
    pub compression: Option<CompressionReport>,
    pub enqueued_at: DateTime<Utc>,
}

impl UploadItem {
    pub fn new(source: SourceFile) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            stage: UploadStage::Pending,
            progress: 0,
            compression: None,
            enqueued_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    pub fn is_active(&self) -> bool {
        self.stage.is_active()
    }

    pub fn final_url(&self) -> Option<&str> {
        match &self.stage {
            UploadStage::Succeeded { final_url } => Some(final_url),
            _ => None,
        }
    }

    pub fn error_reason(&self) -> Option<&str> {
        match &self.stage {
            UploadStage::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn mark_compressing(&mut self) {
        if self.stage == UploadStage::Pending {
            self.stage = UploadStage::Compressing;
            self.progress = 0;
        }
    }

    pub fn mark_signing(&mut self) {
        if self.stage == UploadStage::Compressing {
            self.stage = UploadStage::Signing;
            self.advance_progress(PROGRESS_COMPRESSED);
        }
    }

    pub fn mark_uploading(&mut self) {
        if self.stage == UploadStage::Signing {
            self.stage = UploadStage::Uploading;
            self.advance_progress(PROGRESS_SIGNED);
        }
    }

    pub fn mark_succeeded(&mut self, final_url: String) {
        if !self.stage.is_terminal() {
            self.stage = UploadStage::Succeeded { final_url };
            self.progress = 100;
        }
    }

    pub fn mark_failed(&mut self, reason: String) {
        if !self.stage.is_terminal() {
            self.stage = UploadStage::Failed { reason };
        }
    }

    pub fn mark_cancelled(&mut self) {
        if !self.stage.is_terminal() {
            self.stage = UploadStage::Cancelled;
        }
    }

    /// Re-enter the queue after a failure. Only legal from `Failed`; any
    /// other stage is left untouched. Returns whether the item was reset.
    pub fn reset_for_retry(&mut self) -> bool {
        match self.stage {
            UploadStage::Failed { .. } => {
                self.stage = UploadStage::Pending;
                self.progress = 0;
                self.compression = None;
                true
            }
            _ => false,
        }
    }

    /// Raise progress to `pct` if that is an increase; never moves backwards.
    pub fn advance_progress(&mut self, pct: u8) {
        let pct = pct.min(100);
        if pct > self.progress {
            self.progress = pct;
        }
    }

    /// Map transferred bytes onto the upload segment of the progress range.
    pub fn upload_progress(loaded: u64, total: u64) -> u8 {
        if total == 0 {
            return 100;
        }
        let span = (100 - PROGRESS_SIGNED) as u64;
        let scaled = PROGRESS_SIGNED as u64 + span * loaded.min(total) / total;
        scaled as u8
    }

    pub fn set_compression(&mut self, report: CompressionReport) {
        self.compression = Some(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::compression::CompressionMethod;

    fn test_source() -> SourceFile {
        SourceFile {
            file_name: "front-bumper.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            data: Bytes::from_static(&[0xFF, 0xD8, 0xFF]),
            entity_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_new_item_is_pending() {
        let item = UploadItem::new(test_source());
        assert_eq!(item.stage, UploadStage::Pending);
        assert_eq!(item.progress, 0);
        assert!(item.compression.is_none());
        assert!(item.final_url().is_none());
        assert!(item.error_reason().is_none());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut item = UploadItem::new(test_source());
        item.mark_compressing();
        assert_eq!(item.stage, UploadStage::Compressing);
        item.mark_signing();
        assert_eq!(item.stage, UploadStage::Signing);
        assert_eq!(item.progress, PROGRESS_COMPRESSED);
        item.mark_uploading();
        assert_eq!(item.progress, PROGRESS_SIGNED);
        item.mark_succeeded("https://cdn.example/a.jpg".to_string());
        assert_eq!(item.progress, 100);
        assert_eq!(item.final_url(), Some("https://cdn.example/a.jpg"));
    }

    #[test]
    fn test_final_url_only_when_succeeded() {
        let mut item = UploadItem::new(test_source());
        item.mark_compressing();
        item.mark_failed("decode failed".to_string());
        assert!(item.final_url().is_none());
        assert_eq!(item.error_reason(), Some("decode failed"));
    }

    #[test]
    fn test_terminal_stages_are_sticky() {
        let mut item = UploadItem::new(test_source());
        item.mark_compressing();
        item.mark_succeeded("https://cdn.example/a.jpg".to_string());
        item.mark_failed("late failure".to_string());
        item.mark_cancelled();
        assert!(item.final_url().is_some());
    }

    #[test]
    fn test_retry_only_from_failed() {
        let mut item = UploadItem::new(test_source());
        assert!(!item.reset_for_retry());

        item.mark_compressing();
        item.mark_failed("boom".to_string());
        item.set_compression(CompressionReport {
            original_size: 10,
            compressed_size: 5,
            method: CompressionMethod::Inline,
            compression_ms: 1,
        });
        assert!(item.reset_for_retry());
        assert_eq!(item.stage, UploadStage::Pending);
        assert_eq!(item.progress, 0);
        assert!(item.compression.is_none());

        item.mark_compressing();
        item.mark_succeeded("https://cdn.example/a.jpg".to_string());
        assert!(!item.reset_for_retry());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut item = UploadItem::new(test_source());
        item.mark_compressing();
        item.advance_progress(40);
        item.advance_progress(20);
        assert_eq!(item.progress, 40);
        item.advance_progress(250);
        assert_eq!(item.progress, 100);
    }

    #[test]
    fn test_upload_progress_mapping() {
        assert_eq!(UploadItem::upload_progress(0, 1000), PROGRESS_SIGNED);
        assert_eq!(UploadItem::upload_progress(1000, 1000), 100);
        assert_eq!(UploadItem::upload_progress(2000, 1000), 100);
        let half = UploadItem::upload_progress(500, 1000);
        assert!(half > PROGRESS_SIGNED && half < 100);
    }

    #[test]
    fn test_cancel_from_non_terminal() {
        let mut item = UploadItem::new(test_source());
        item.mark_compressing();
        item.mark_cancelled();
        assert_eq!(item.stage, UploadStage::Cancelled);
        assert!(!item.reset_for_retry());
    }
}
