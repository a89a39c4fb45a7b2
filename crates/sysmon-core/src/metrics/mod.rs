//! Per-family metric records and the collectors that produce them.
//!
//! Every collector turns raw [`MetricSource`](crate::source::MetricSource)
//! readings into one immutable record per invocation. A failed read is
//! logged and replaced by the family's zero record.

mod cpu;
mod disk;
mod memory;
mod network;

pub use cpu::CpuCollector;
pub use disk::{DiskCollector, EXCLUDED_FS_TYPES};
pub use memory::MemoryCollector;
pub use network::NetworkCollector;

use serde::{Deserialize, Serialize};

/// Trait for all collectors.
pub trait Collector: Send + 'static {
    /// Record produced by one invocation.
    type Sample: Send + 'static;

    /// Returns the metric family name, used in logs.
    fn name(&self) -> &str;

    /// Reads the source once. May block.
    fn collect(&mut self) -> Self::Sample;
}

/// CPU usage record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    /// Global usage (0-100).
    pub usage_percent: f64,
    /// Rated maximum frequency scaled by the usage fraction, in MHz.
    ///
    /// This tracks load, not the real clock: dynamic frequency scaling is
    /// not observed.
    pub frequency_mhz: f64,
}

/// Memory and swap record. Byte figures are absolute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub usage_percent: f64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    pub swap_used_bytes: u64,
    pub swap_total_bytes: u64,
    pub swap_used_percent: f64,
}

/// Disk usage aggregated over physical filesystems.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskMetrics {
    pub usage_percent: f64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    pub total_bytes: u64,
}

/// Network throughput record. Rates are in bytes/second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub upload_rate: f64,
    pub download_rate: f64,
    pub total_sent_bytes: u64,
    pub total_received_bytes: u64,
}

/// Returns `part / whole` as a percentage in [0, 100], or 0 when `whole` is 0.
pub(crate) fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (100.0 * part as f64 / whole as f64).clamp(0.0, 100.0)
}
