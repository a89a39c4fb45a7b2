//! Raw metric sources.
//!
//! A [`MetricSource`] is the boundary to the operating system. Every call is
//! synchronous and may block; the engine runs them on the blocking pool.

mod procfs;

pub use procfs::ProcfsSource;

use crate::Result;
use std::time::Duration;

/// Virtual memory counters in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VirtualMemory {
    pub total: u64,
    pub available: u64,
}

/// Swap counters in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapMemory {
    pub total: u64,
    pub free: u64,
}

/// A mounted filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Backing device (e.g. "/dev/nvme0n1p2").
    pub device: String,
    pub mount_point: String,
    /// Filesystem type as reported by the kernel (e.g. "ext4", "tmpfs").
    pub fs_type: String,
}

impl Partition {
    pub fn new(device: &str, mount_point: &str, fs_type: &str) -> Self {
        Self {
            device: device.to_string(),
            mount_point: mount_point.to_string(),
            fs_type: fs_type.to_string(),
        }
    }
}

/// Space usage of one partition in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionUsage {
    pub total: u64,
    pub used: u64,
}

/// Cumulative network byte counters summed over all interfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

/// Host metric source.
pub trait MetricSource: Send + Sync + 'static {
    /// Samples global CPU usage (0-100) over `window`, blocking for its duration.
    fn cpu_percent(&self, window: Duration) -> Result<f64>;

    /// Returns the rated maximum CPU frequency in MHz.
    fn cpu_max_frequency(&self) -> Result<f64>;

    /// Reads virtual memory counters.
    fn virtual_memory(&self) -> Result<VirtualMemory>;

    /// Reads swap counters.
    fn swap_memory(&self) -> Result<SwapMemory>;

    /// Lists mounted partitions.
    fn partitions(&self) -> Result<Vec<Partition>>;

    /// Queries space usage for one partition.
    fn partition_usage(&self, partition: &Partition) -> Result<PartitionUsage>;

    /// Reads cumulative network byte counters.
    fn net_counters(&self) -> Result<NetCounters>;
}
