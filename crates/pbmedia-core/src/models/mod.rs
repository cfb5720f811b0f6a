pub mod compression;
pub mod network;
pub mod signing;
pub mod snapshot;
pub mod upload_item;

pub use compression::{CompressionBudget, CompressionMethod, CompressionReport};
pub use network::{ConnectionClass, NetworkProfile};
pub use signing::{UploadAuthorization, UploadFileMeta};
pub use snapshot::{ItemSnapshot, QueueSnapshot, UploadStatus};
pub use upload_item::{SourceFile, UploadItem, UploadStage};
