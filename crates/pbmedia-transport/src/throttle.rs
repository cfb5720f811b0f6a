//! Progress event throttling.
//!
//! Byte-level progress callbacks fire far more often than any UI can
//! usefully render; the throttler bounds the emission rate while always
//! letting the terminal (fully-loaded) report through. Lock-free: a CAS on
//! the last-emission timestamp arbitrates between concurrent reporters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Progress callback: `(loaded_bytes, total_bytes)`.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Default minimum interval between progress emissions.
pub const DEFAULT_THROTTLE_INTERVAL_MS: u64 = 100;

/// Sentinel meaning "nothing emitted yet".
const NEVER_EMITTED: u64 = 0;

#[derive(Debug)]
pub struct ProgressThrottler {
    last_emit_nanos: AtomicU64,
    interval_nanos: u64,
}

impl ProgressThrottler {
    pub fn new(interval: Duration) -> Self {
        Self {
            last_emit_nanos: AtomicU64::new(NEVER_EMITTED),
            interval_nanos: interval.as_nanos() as u64,
        }
    }

    pub fn with_millis(interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(interval_ms))
    }

    /// Returns true when an event should be emitted now, updating the
    /// timestamp. The first call always emits.
    pub fn should_emit(&self) -> bool {
        let now = Self::current_nanos();
        let last = self.last_emit_nanos.load(Ordering::Relaxed);

        if last != NEVER_EMITTED && now.saturating_sub(last) < self.interval_nanos {
            return false;
        }
        // CAS so only one of several racing reporters wins the slot.
        self.last_emit_nanos
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }

    /// Unconditionally claim an emission slot (used for terminal updates).
    pub fn force_emit(&self) {
        self.last_emit_nanos
            .store(Self::current_nanos(), Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.last_emit_nanos.store(NEVER_EMITTED, Ordering::Relaxed);
    }

    /// Monotonic nanoseconds since the first use in this process; immune to
    /// wall-clock jumps. Offset by 1 so the sentinel stays unambiguous.
    fn current_nanos() -> u64 {
        static START: OnceLock<Instant> = OnceLock::new();
        START.get_or_init(Instant::now).elapsed().as_nanos() as u64 + 1
    }
}

impl Default for ProgressThrottler {
    fn default() -> Self {
        Self::with_millis(DEFAULT_THROTTLE_INTERVAL_MS)
    }
}

/// A progress callback wrapped with rate limiting.
pub struct ThrottledProgress {
    throttler: ProgressThrottler,
    callback: ProgressFn,
}

impl ThrottledProgress {
    pub fn new(interval: Duration, callback: ProgressFn) -> Self {
        Self {
            throttler: ProgressThrottler::new(interval),
            callback,
        }
    }

    /// Forward a progress update, subject to the rate limit. Terminal
    /// updates (`loaded >= total`) always go through.
    pub fn report(&self, loaded: u64, total: u64) {
        if loaded >= total {
            self.throttler.force_emit();
            (self.callback)(loaded, total);
        } else if self.throttler.should_emit() {
            (self.callback)(loaded, total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread;

    #[test]
    fn test_first_emission_passes() {
        let throttler = ProgressThrottler::with_millis(100);
        assert!(throttler.should_emit());
        assert!(!throttler.should_emit());
    }

    #[test]
    fn test_emission_after_interval() {
        let throttler = ProgressThrottler::with_millis(20);
        assert!(throttler.should_emit());
        thread::sleep(Duration::from_millis(30));
        assert!(throttler.should_emit());
    }

    #[test]
    fn test_reset_reopens_slot() {
        let throttler = ProgressThrottler::with_millis(10_000);
        assert!(throttler.should_emit());
        assert!(!throttler.should_emit());
        throttler.reset();
        assert!(throttler.should_emit());
    }

    #[test]
    fn test_terminal_update_always_delivered() {
        let seen: Arc<Mutex<Vec<(u64, u64)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let progress = ThrottledProgress::new(
            Duration::from_secs(10),
            Arc::new(move |loaded, total| seen_clone.lock().unwrap().push((loaded, total))),
        );

        progress.report(10, 100);
        progress.report(20, 100); // throttled away
        progress.report(100, 100); // terminal, forced through

        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[(10, 100), (100, 100)]);
    }
}
