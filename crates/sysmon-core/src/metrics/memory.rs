//! Memory and swap collector.

use super::{percent, Collector, MemoryMetrics};
use crate::source::MetricSource;
use std::sync::Arc;
use tracing::{debug, warn};

/// Memory usage collector.
pub struct MemoryCollector {
    source: Arc<dyn MetricSource>,
}

impl MemoryCollector {
    /// Creates a new memory collector.
    pub fn new(source: Arc<dyn MetricSource>) -> Self {
        Self { source }
    }
}

impl Collector for MemoryCollector {
    type Sample = MemoryMetrics;

    fn name(&self) -> &str {
        "memory"
    }

    /// Reads virtual memory and swap independently; a failure of one leaves
    /// the other half of the record intact.
    fn collect(&mut self) -> MemoryMetrics {
        let mut metrics = MemoryMetrics::default();

        match self.source.virtual_memory() {
            Ok(memory) => {
                let available = memory.available.min(memory.total);
                let used = memory.total - available;
                metrics.usage_percent = percent(used, memory.total);
                metrics.used_bytes = used;
                metrics.available_bytes = available;
            }
            Err(e) => warn!("Error getting virtual memory stats: {}", e),
        }

        match self.source.swap_memory() {
            Ok(swap) => {
                let used = swap.total.saturating_sub(swap.free);
                metrics.swap_total_bytes = swap.total;
                metrics.swap_used_bytes = used;
                metrics.swap_used_percent = percent(used, swap.total);
            }
            Err(e) => warn!("Error getting swap memory stats: {}", e),
        }

        debug!(
            usage = metrics.usage_percent,
            swap = metrics.swap_used_percent,
            "memory sampled"
        );
        metrics
    }
}
