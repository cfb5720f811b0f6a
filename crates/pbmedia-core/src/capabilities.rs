//! Device capability probe.
//!
//! Detects, once per process, whether compression can run off the async
//! executor (dedicated blocking pool) and whether the host should be treated
//! as low-end, which lowers the default upload concurrency and compression
//! defaults. Probing never fails: any detection error degrades to the
//! conservative answer.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;

use sysinfo::System;

const OFFLOAD_MIN_CORES: usize = 2;
const LOW_END_MIN_CORES: usize = 4;
const LOW_END_MIN_MEMORY_BYTES: u64 = 4 * 1024 * 1024 * 1024;

const LOW_END_CONCURRENCY: usize = 2;
const DEFAULT_CONCURRENCY: usize = 4;

/// What the host can do, probed once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Compression may run on the blocking pool instead of the calling task.
    pub offload_available: bool,
    /// Host is resource constrained; prefer lower concurrency and budgets.
    pub low_end_device: bool,
}

impl DeviceCapabilities {
    /// Inspect the host. Any probing failure yields [`Self::conservative`].
    pub fn probe() -> Self {
        catch_unwind(AssertUnwindSafe(Self::detect)).unwrap_or_else(|_| {
            tracing::warn!("Capability detection panicked, assuming conservative defaults");
            Self::conservative()
        })
    }

    fn detect() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();

        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let total_memory = sys.total_memory();

        let capabilities = Self {
            offload_available: cores >= OFFLOAD_MIN_CORES,
            low_end_device: cores < LOW_END_MIN_CORES || total_memory < LOW_END_MIN_MEMORY_BYTES,
        };

        tracing::debug!(
            cores = cores,
            total_memory_bytes = total_memory,
            offload_available = capabilities.offload_available,
            low_end_device = capabilities.low_end_device,
            "Probed device capabilities"
        );

        capabilities
    }

    /// Defaults assumed when nothing can be detected.
    pub fn conservative() -> Self {
        Self {
            offload_available: false,
            low_end_device: true,
        }
    }

    /// Concurrency cap derived from the device class.
    pub fn default_concurrency(&self) -> usize {
        if self.low_end_device {
            LOW_END_CONCURRENCY
        } else {
            DEFAULT_CONCURRENCY
        }
    }
}

/// Process-wide cached probe result.
pub fn capabilities() -> DeviceCapabilities {
    static CAPABILITIES: OnceLock<DeviceCapabilities> = OnceLock::new();
    *CAPABILITIES.get_or_init(DeviceCapabilities::probe)
}
