use serde::Serialize;

/// Size/quality target handed to the compression engine.
///
/// Derived from the current [`ConnectionClass`](super::network::ConnectionClass)
/// via `PipelineConfig::budget_for`. The engine treats `max_bytes` as a goal,
/// not a guarantee: it returns the best encoding it reached within its
/// iteration bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionBudget {
    /// Target ceiling for the encoded payload.
    pub max_bytes: usize,
    /// Lowest acceptable encoder quality (0-100).
    pub min_quality: u8,
    /// Neither output side may exceed this, aspect ratio preserved.
    pub max_dimension: u32,
}

/// Where the encoding work ran.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompressionMethod {
    /// Dedicated blocking pool, off the async executor threads.
    BlockingPool,
    /// Inline on the calling task (fallback for constrained hosts).
    Inline,
}

/// Outcome metadata for one compressed file, surfaced in queue snapshots.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompressionReport {
    pub original_size: usize,
    pub compressed_size: usize,
    pub method: CompressionMethod,
    pub compression_ms: u64,
}

impl CompressionReport {
    /// Bytes saved relative to the source, zero if encoding grew the file.
    pub fn bytes_saved(&self) -> usize {
        self.original_size.saturating_sub(self.compressed_size)
    }
}
