//! Disk usage aggregator.

use super::{percent, Collector, DiskMetrics};
use crate::source::MetricSource;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Filesystem types that never count towards disk usage.
pub const EXCLUDED_FS_TYPES: &[&str] = &[
    "tmpfs", "overlay", "proc", "sysfs", "cgroup", "squashfs", "devtmpfs", "vfat",
];

/// Aggregates usage across every physical partition.
pub struct DiskCollector {
    source: Arc<dyn MetricSource>,
}

impl DiskCollector {
    /// Creates a new disk collector.
    pub fn new(source: Arc<dyn MetricSource>) -> Self {
        Self { source }
    }

    fn is_excluded(fs_type: &str) -> bool {
        EXCLUDED_FS_TYPES.contains(&fs_type)
    }
}

impl Collector for DiskCollector {
    type Sample = DiskMetrics;

    fn name(&self) -> &str {
        "disk"
    }

    fn collect(&mut self) -> DiskMetrics {
        let partitions = match self.source.partitions() {
            Ok(partitions) => partitions,
            Err(e) => {
                warn!("Error getting disk partitions: {}", e);
                return DiskMetrics::default();
            }
        };

        let mut seen_devices = HashSet::new();
        let mut total_used: u64 = 0;
        let mut total_size: u64 = 0;

        for partition in &partitions {
            if Self::is_excluded(&partition.fs_type) {
                continue;
            }
            // Bind mounts expose the same device more than once
            if !seen_devices.insert(partition.device.as_str()) {
                continue;
            }

            let usage = match self.source.partition_usage(partition) {
                Ok(usage) => usage,
                Err(e) => {
                    warn!(
                        "Error getting usage for partition {}: {}",
                        partition.mount_point, e
                    );
                    continue;
                }
            };

            total_used = total_used.saturating_add(usage.used.min(usage.total));
            total_size = total_size.saturating_add(usage.total);
        }

        if total_size == 0 {
            return DiskMetrics::default();
        }

        let metrics = DiskMetrics {
            usage_percent: percent(total_used, total_size),
            used_bytes: total_used,
            available_bytes: total_size - total_used,
            total_bytes: total_size,
        };
        debug!(usage = metrics.usage_percent, "disk sampled");
        metrics
    }
}
