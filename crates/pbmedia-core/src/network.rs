//! Rolling network quality estimation.
//!
//! The profiler ingests completed transfer timings from the upload transport
//! and maintains an exponentially weighted throughput estimate, so a single
//! bursty measurement cannot dominate the classification. Estimates that go
//! stale decay toward a conservative default until fresh samples arrive.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::config::{BandThresholds, PipelineConfig};
use crate::models::network::{ConnectionClass, NetworkProfile};

/// Transfers at or below this size are latency-dominated and feed the
/// round-trip estimate instead of only the throughput estimate.
const RTT_SAMPLE_MAX_BYTES: u64 = 32 * 1024;

/// Shortest elapsed time accepted for a sample; guards the division.
const MIN_SAMPLE_ELAPSED: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct ProfilerConfig {
    /// Weight of the newest sample in the moving average (0..=1).
    pub ewma_alpha: f64,
    /// Estimates older than this start decaying toward the default.
    pub stale_after: Duration,
    /// Connection-type hint used before any samples exist.
    pub connection_hint: Option<ConnectionClass>,
    pub thresholds: BandThresholds,
}

impl ProfilerConfig {
    pub fn from_pipeline(config: &PipelineConfig) -> Self {
        Self {
            ewma_alpha: config.profiler_ewma_alpha,
            stale_after: Duration::from_millis(config.profile_stale_after_ms),
            connection_hint: config.connection_hint,
            thresholds: config.thresholds,
        }
    }
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self::from_pipeline(&PipelineConfig::default())
    }
}

#[derive(Debug, Default)]
struct ProfilerState {
    ewma_bytes_per_second: Option<f64>,
    ewma_rtt_ms: Option<f64>,
    last_sample: Option<Instant>,
}

/// Maintains the rolling network estimate behind a short-lived lock.
///
/// Owned state only; safe to share via `Arc` between the transport (writer)
/// and the queue manager (reader).
#[derive(Debug)]
pub struct NetworkProfiler {
    config: ProfilerConfig,
    state: Mutex<ProfilerState>,
}

impl NetworkProfiler {
    pub fn new(config: ProfilerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ProfilerState::default()),
        }
    }

    /// Ingest one completed transfer's timing.
    pub fn record_transfer(&self, bytes: u64, elapsed: Duration) {
        let elapsed = elapsed.max(MIN_SAMPLE_ELAPSED);
        let sample = bytes as f64 / elapsed.as_secs_f64();
        let alpha = self.config.ewma_alpha;

        let mut state = self.state.lock().expect("profiler state poisoned");
        state.ewma_bytes_per_second = Some(match state.ewma_bytes_per_second {
            Some(previous) => alpha * sample + (1.0 - alpha) * previous,
            None => sample,
        });
        if bytes <= RTT_SAMPLE_MAX_BYTES {
            let rtt_ms = elapsed.as_secs_f64() * 1000.0;
            state.ewma_rtt_ms = Some(match state.ewma_rtt_ms {
                Some(previous) => alpha * rtt_ms + (1.0 - alpha) * previous,
                None => rtt_ms,
            });
        }
        state.last_sample = Some(Instant::now());

        tracing::trace!(
            bytes = bytes,
            elapsed_ms = elapsed.as_millis() as u64,
            sample_bps = sample as u64,
            ewma_bps = state.ewma_bytes_per_second.unwrap_or(0.0) as u64,
            "Recorded transfer sample"
        );
    }

    /// Current best estimate of the connection.
    pub fn profile(&self) -> NetworkProfile {
        let state = self.state.lock().expect("profiler state poisoned");

        let fallback = self
            .config
            .connection_hint
            .unwrap_or(ConnectionClass::Medium);
        let bytes_per_second = match (state.ewma_bytes_per_second, state.last_sample) {
            (Some(estimate), Some(last)) => self.decayed(estimate, last.elapsed(), fallback),
            _ => fallback.assumed_bytes_per_second() as f64,
        };

        let class = self.config.thresholds.classify(bytes_per_second as u64);
        let rtt = state
            .ewma_rtt_ms
            .map(|ms| Duration::from_secs_f64(ms / 1000.0))
            .unwrap_or_else(|| class.assumed_rtt());

        NetworkProfile {
            class,
            bytes_per_second: bytes_per_second as u64,
            rtt,
            sampled_at: Utc::now(),
        }
    }

    /// Classify a raw throughput figure against the configured bands.
    pub fn classify(&self, bytes_per_second: u64) -> ConnectionClass {
        self.config.thresholds.classify(bytes_per_second)
    }

    /// Geometric decay toward the fallback assumption, one halving of the
    /// distance per elapsed staleness window.
    fn decayed(&self, estimate: f64, age: Duration, fallback: ConnectionClass) -> f64 {
        let window_ms = self.config.stale_after.as_millis().max(1) as u64;
        let windows = (age.as_millis() as u64 / window_ms) as i32;
        if windows == 0 {
            return estimate;
        }
        let target = fallback.assumed_bytes_per_second() as f64;
        target + (estimate - target) * 0.5_f64.powi(windows)
    }
}
