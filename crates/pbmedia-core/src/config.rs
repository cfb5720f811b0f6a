//! Configuration module
//!
//! Tunables for the upload pipeline: intake limits, network classification
//! bands and their compression budgets, transport retry parameters, and
//! profiler behavior. Band boundaries and budgets are configuration, not
//! contract; defaults below are starting points meant to be tuned against
//! real telemetry.

use std::env;
use std::str::FromStr;

use crate::models::compression::CompressionBudget;
use crate::models::network::ConnectionClass;

// Intake
const MAX_FILE_SIZE_BYTES: usize = 10 * 1024 * 1024;
const ALLOWED_CONTENT_TYPE_PREFIX: &str = "image/";

// Band boundaries (bytes/second)
const SLOW_BAND_MAX_BPS: u64 = 50 * 1024;
const FAST_BAND_MIN_BPS: u64 = 500 * 1024;

// Transport
const UPLOAD_MAX_RETRIES: u32 = 3;
const UPLOAD_BASE_DELAY_MS: u64 = 1000;
const UPLOAD_BACKOFF_MULTIPLIER: u32 = 2;
const UPLOAD_STALL_TIMEOUT_SECS: u64 = 30;
const PROGRESS_THROTTLE_MS: u64 = 100;

// Profiler
const PROFILER_EWMA_ALPHA: f64 = 0.3;
const PROFILE_STALE_AFTER_MS: u64 = 30_000;

/// Throughput boundaries between the slow/medium/fast bands.
#[derive(Debug, Clone, Copy)]
pub struct BandThresholds {
    pub slow_max_bytes_per_second: u64,
    pub fast_min_bytes_per_second: u64,
}

impl BandThresholds {
    pub fn classify(&self, bytes_per_second: u64) -> ConnectionClass {
        if bytes_per_second < self.slow_max_bytes_per_second {
            ConnectionClass::Slow
        } else if bytes_per_second > self.fast_min_bytes_per_second {
            ConnectionClass::Fast
        } else {
            ConnectionClass::Medium
        }
    }
}

impl Default for BandThresholds {
    fn default() -> Self {
        Self {
            slow_max_bytes_per_second: SLOW_BAND_MAX_BPS,
            fast_min_bytes_per_second: FAST_BAND_MIN_BPS,
        }
    }
}

/// Compression budget per connection band.
#[derive(Debug, Clone, Copy)]
pub struct BandBudgets {
    pub slow: CompressionBudget,
    pub medium: CompressionBudget,
    pub fast: CompressionBudget,
}

impl Default for BandBudgets {
    fn default() -> Self {
        Self {
            slow: CompressionBudget {
                max_bytes: 300 * 1024,
                min_quality: 40,
                max_dimension: 1280,
            },
            medium: CompressionBudget {
                max_bytes: 800 * 1024,
                min_quality: 55,
                max_dimension: 1920,
            },
            fast: CompressionBudget {
                max_bytes: 2 * 1024 * 1024,
                min_quality: 70,
                max_dimension: 2560,
            },
        }
    }
}

/// Pipeline configuration with env overrides (`PBMEDIA_*`).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_file_size_bytes: usize,
    pub allowed_content_type_prefix: String,
    pub allowed_extensions: Vec<String>,
    /// Overrides the capability-derived concurrency cap when set.
    pub concurrency_override: Option<usize>,
    pub thresholds: BandThresholds,
    pub budgets: BandBudgets,
    pub upload_max_retries: u32,
    pub upload_base_delay_ms: u64,
    pub upload_backoff_multiplier: u32,
    pub upload_stall_timeout_secs: u64,
    pub progress_throttle_ms: u64,
    pub profiler_ewma_alpha: f64,
    pub profile_stale_after_ms: u64,
    /// Stand-in for a connection-type hint from the host environment; used
    /// by the profiler until real transfer samples arrive.
    pub connection_hint: Option<ConnectionClass>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
            allowed_content_type_prefix: ALLOWED_CONTENT_TYPE_PREFIX.to_string(),
            allowed_extensions: ["jpg", "jpeg", "png", "webp", "gif"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            concurrency_override: None,
            thresholds: BandThresholds::default(),
            budgets: BandBudgets::default(),
            upload_max_retries: UPLOAD_MAX_RETRIES,
            upload_base_delay_ms: UPLOAD_BASE_DELAY_MS,
            upload_backoff_multiplier: UPLOAD_BACKOFF_MULTIPLIER,
            upload_stall_timeout_secs: UPLOAD_STALL_TIMEOUT_SECS,
            progress_throttle_ms: PROGRESS_THROTTLE_MS,
            profiler_ewma_alpha: PROFILER_EWMA_ALPHA,
            profile_stale_after_ms: PROFILE_STALE_AFTER_MS,
            connection_hint: None,
        }
    }
}

impl PipelineConfig {
    /// Build a config from the environment, falling back to defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            max_file_size_bytes: env_parse("PBMEDIA_MAX_FILE_SIZE_BYTES", MAX_FILE_SIZE_BYTES),
            concurrency_override: env::var("PBMEDIA_MAX_CONCURRENT_UPLOADS")
                .ok()
                .and_then(|v| v.parse().ok()),
            thresholds: BandThresholds {
                slow_max_bytes_per_second: env_parse("PBMEDIA_SLOW_BAND_MAX_BPS", SLOW_BAND_MAX_BPS),
                fast_min_bytes_per_second: env_parse("PBMEDIA_FAST_BAND_MIN_BPS", FAST_BAND_MIN_BPS),
            },
            upload_max_retries: env_parse("PBMEDIA_UPLOAD_MAX_RETRIES", UPLOAD_MAX_RETRIES),
            upload_base_delay_ms: env_parse("PBMEDIA_UPLOAD_BASE_DELAY_MS", UPLOAD_BASE_DELAY_MS),
            upload_backoff_multiplier: env_parse(
                "PBMEDIA_UPLOAD_BACKOFF_MULTIPLIER",
                UPLOAD_BACKOFF_MULTIPLIER,
            ),
            upload_stall_timeout_secs: env_parse(
                "PBMEDIA_UPLOAD_STALL_TIMEOUT_SECS",
                UPLOAD_STALL_TIMEOUT_SECS,
            ),
            progress_throttle_ms: env_parse("PBMEDIA_PROGRESS_THROTTLE_MS", PROGRESS_THROTTLE_MS),
            profiler_ewma_alpha: env_parse("PBMEDIA_PROFILER_EWMA_ALPHA", PROFILER_EWMA_ALPHA),
            profile_stale_after_ms: env_parse(
                "PBMEDIA_PROFILE_STALE_AFTER_MS",
                PROFILE_STALE_AFTER_MS,
            ),
            connection_hint: env::var("PBMEDIA_CONNECTION_HINT")
                .ok()
                .and_then(|v| v.parse().ok()),
            ..defaults
        }
    }

    pub fn budget_for(&self, class: ConnectionClass) -> CompressionBudget {
        match class {
            ConnectionClass::Slow => self.budgets.slow,
            ConnectionClass::Medium => self.budgets.medium,
            ConnectionClass::Fast => self.budgets.fast,
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
