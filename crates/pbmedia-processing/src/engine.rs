//! Budget-driven compression engine.
//!
//! Takes a source image and a [`CompressionBudget`] and produces an encoded
//! payload that aims to fit `max_bytes`: encode at an opening quality, then
//! step quality down toward the budget's floor and, once the floor is hit,
//! shrink dimensions, for a bounded number of refinement passes. The best
//! (smallest) encoding reached is always returned, so the engine terminates
//! even when the budget is unreachable.
//!
//! The same synchronous routine runs on the blocking pool when the host
//! allows offloading and inline otherwise; the two paths produce identical
//! bytes for identical inputs.

use std::io::Cursor;
use std::time::Instant;

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use pbmedia_core::capabilities::DeviceCapabilities;
use pbmedia_core::models::compression::{CompressionBudget, CompressionMethod, CompressionReport};

use crate::compression::{encode, select_format, OutputFormat};

/// Opening encoder quality before any refinement.
const START_QUALITY: u8 = 80;
/// Quality reduction per refinement pass.
const QUALITY_STEP: u8 = 10;
/// Additional encode passes allowed after the first attempt.
const REFINEMENT_LIMIT: usize = 4;
/// Dimensions never shrink below this, whatever the budget says.
const MIN_DIMENSION: u32 = 320;

#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("Could not decode image: {0}")]
    Decode(String),

    #[error("Image encoding failed: {0}")]
    Encode(String),

    #[error("Compression task was aborted")]
    Aborted,
}

/// A compressed payload plus the metadata surfaced in queue snapshots.
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub data: Bytes,
    pub format: OutputFormat,
    pub report: CompressionReport,
}

/// Stateless compression service; construct once and share.
#[derive(Debug, Clone)]
pub struct CompressionEngine {
    offload: bool,
}

impl CompressionEngine {
    pub fn new(capabilities: &DeviceCapabilities) -> Self {
        Self {
            offload: capabilities.offload_available,
        }
    }

    /// Compress `data` against `budget`, off the async executor when the
    /// capability probe allows it.
    pub async fn compress(
        &self,
        data: Bytes,
        budget: CompressionBudget,
    ) -> Result<CompressedImage, CompressionError> {
        if self.offload {
            let result = tokio::task::spawn_blocking(move || compress_blocking(data, budget)).await;
            match result {
                Ok(compressed) => compressed.map(|mut c| {
                    c.report.method = CompressionMethod::BlockingPool;
                    c
                }),
                Err(join_error) => {
                    tracing::error!(error = %join_error, "Compression task did not complete");
                    Err(CompressionError::Aborted)
                }
            }
        } else {
            compress_blocking(data, budget)
        }
    }
}

/// The actual compression routine; shared by both execution paths.
fn compress_blocking(
    data: Bytes,
    budget: CompressionBudget,
) -> Result<CompressedImage, CompressionError> {
    let started = Instant::now();
    let original_size = data.len();

    let img = image::ImageReader::new(Cursor::new(data.as_ref()))
        .with_guessed_format()
        .map_err(|e| CompressionError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| CompressionError::Decode(e.to_string()))?;

    let format = select_format(&img);
    let mut quality = START_QUALITY.max(budget.min_quality);
    let mut max_dimension = budget.max_dimension.max(MIN_DIMENSION);

    let mut working = resize_to_fit(&img, max_dimension);
    let mut best = encode(&working, format, quality)
        .map_err(|e| CompressionError::Encode(e.to_string()))?;

    let mut passes = 0;
    while best.len() > budget.max_bytes && passes < REFINEMENT_LIMIT {
        passes += 1;
        if quality.saturating_sub(QUALITY_STEP) >= budget.min_quality {
            quality -= QUALITY_STEP;
        } else {
            let next = (max_dimension * 9 / 10).max(MIN_DIMENSION);
            if next == max_dimension {
                break;
            }
            max_dimension = next;
            working = resize_to_fit(&img, max_dimension);
        }

        let candidate = encode(&working, format, quality)
            .map_err(|e| CompressionError::Encode(e.to_string()))?;
        if candidate.len() < best.len() {
            best = candidate;
        }
    }

    let compression_ms = started.elapsed().as_millis() as u64;
    tracing::debug!(
        original_size = original_size,
        compressed_size = best.len(),
        target_bytes = budget.max_bytes,
        quality = quality,
        passes = passes,
        format = format.to_mime_type(),
        compression_ms = compression_ms,
        "Compressed image"
    );

    Ok(CompressedImage {
        format,
        report: CompressionReport {
            original_size,
            compressed_size: best.len(),
            method: CompressionMethod::Inline,
            compression_ms,
        },
        data: Bytes::from(best),
    })
}

fn resize_to_fit(img: &DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_dimension && height <= max_dimension {
        img.clone()
    } else {
        img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    }
}
