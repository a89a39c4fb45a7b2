//! sysmon core
//!
//! Samples host CPU, memory, disk and network utilization on independent
//! 1 s cadences and publishes the latest record of each family into a
//! lock-guarded snapshot that a renderer can read once per frame.

pub mod display;
pub mod error;
pub mod history;
pub mod metrics;
pub mod monitor;
pub mod snapshot;
pub mod source;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use history::{NetworkHistory, TrendBuffer, DEFAULT_HISTORY_LEN};
pub use metrics::{CpuMetrics, DiskMetrics, MemoryMetrics, NetworkMetrics};
pub use monitor::{Monitor, SAMPLE_PERIOD};
pub use snapshot::{SharedSnapshot, SystemSnapshot};
pub use source::{MetricSource, ProcfsSource};
