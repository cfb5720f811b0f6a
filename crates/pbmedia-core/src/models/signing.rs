use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// File metadata sent to the signing service when requesting an upload slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFileMeta {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// Owning marketplace entity (e.g. a parts listing) the asset belongs to.
    pub entity_id: Uuid,
}

/// Authorization to perform one authenticated upload to remote storage.
///
/// Issued by the signing service; consumed by the upload transport. The
/// `headers` carry whatever credential material the destination requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadAuthorization {
    pub upload_id: Uuid,
    pub destination_url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    pub expires_at: DateTime<Utc>,
}

impl UploadAuthorization {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
