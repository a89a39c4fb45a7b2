//! CPU usage collector.

use super::{Collector, CpuMetrics};
use crate::source::MetricSource;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Length of the blocking usage sample.
pub const CPU_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// CPU usage collector.
pub struct CpuCollector {
    source: Arc<dyn MetricSource>,
    window: Duration,
}

impl CpuCollector {
    /// Creates a new CPU collector sampling over [`CPU_SAMPLE_WINDOW`].
    pub fn new(source: Arc<dyn MetricSource>) -> Self {
        Self::with_window(source, CPU_SAMPLE_WINDOW)
    }

    pub(crate) fn with_window(source: Arc<dyn MetricSource>, window: Duration) -> Self {
        Self { source, window }
    }
}

impl Collector for CpuCollector {
    type Sample = CpuMetrics;

    fn name(&self) -> &str {
        "cpu"
    }

    fn collect(&mut self) -> CpuMetrics {
        let usage = match self.source.cpu_percent(self.window) {
            Ok(usage) if usage.is_finite() => usage.clamp(0.0, 100.0),
            Ok(usage) => {
                warn!("CPU usage reading is not finite: {}", usage);
                return CpuMetrics::default();
            }
            Err(e) => {
                warn!("Error getting CPU usage: {}", e);
                return CpuMetrics::default();
            }
        };

        let frequency = match self.source.cpu_max_frequency() {
            Ok(max_mhz) if max_mhz.is_finite() && max_mhz > 0.0 => max_mhz * usage / 100.0,
            Ok(_) => 0.0,
            Err(e) => {
                warn!("Error getting CPU frequency: {}", e);
                0.0
            }
        };

        debug!(usage, frequency, "cpu sampled");
        CpuMetrics {
            usage_percent: usage,
            frequency_mhz: frequency,
        }
    }
}
