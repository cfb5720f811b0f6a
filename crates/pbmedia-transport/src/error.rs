/// Transport operation errors
///
/// Transient failures are retried inside the transport; fatal failures
/// propagate immediately. Cancellation is its own outcome, never an error
/// in the UI sense.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transient transport failure: {0}")]
    Transient(String),

    #[error("Upload rejected: {0}")]
    Fatal(String),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Upload failed after {attempts} attempts, retries exhausted: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Transient(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }
}
