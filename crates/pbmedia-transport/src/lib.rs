//! PartsBay Media Transport Library
//!
//! Remote collaborator contracts for the upload pipeline: the signing
//! service (upload authorization), the retrying upload transport with its
//! backends (HTTP and local filesystem), progress throttling, and the
//! fire-and-forget thumbnail post-processor client.

pub mod error;
pub mod http;
pub mod local;
pub mod retry;
pub mod signing;
pub mod throttle;
pub mod thumbnail;
pub mod transport;

pub use error::TransportError;
pub use http::HttpBackend;
pub use local::LocalBackend;
pub use retry::BackoffPolicy;
pub use signing::{AuthorizationError, HttpSigningClient, SigningClient, StaticSigner};
pub use throttle::{ProgressFn, ProgressThrottler, ThrottledProgress};
pub use thumbnail::{HttpThumbnailClient, NoOpThumbnailer, ThumbnailClient, ThumbnailError};
pub use transport::{RetryingTransport, TransportBackend, UploadTransport, UploadedAsset};
