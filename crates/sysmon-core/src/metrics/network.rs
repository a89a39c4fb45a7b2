//! Network throughput collector.
//!
//! The kernel only exposes cumulative byte counters, so the rate is derived
//! by differencing consecutive reads over the elapsed time.

use super::{Collector, NetworkMetrics};
use crate::source::{MetricSource, NetCounters};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Counters and time of the last accepted read.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Baseline {
    counters: NetCounters,
    at: Instant,
}

/// Network throughput collector.
///
/// Yields `None` when there is nothing to publish: the first successful read
/// (warm-up, which only primes the baseline), or a read with no elapsed
/// time. In both cases the previously published value should be kept.
pub struct NetworkCollector {
    source: Arc<dyn MetricSource>,
    baseline: Option<Baseline>,
}

impl NetworkCollector {
    /// Creates a new network collector. No counters are read until the
    /// first `collect`.
    pub fn new(source: Arc<dyn MetricSource>) -> Self {
        Self {
            source,
            baseline: None,
        }
    }

    /// Computes the rate from `counters` read at `now`.
    ///
    /// State is only advanced when a rate is produced (or when priming an
    /// empty baseline).
    pub fn rate_at(&mut self, counters: NetCounters, now: Instant) -> Option<NetworkMetrics> {
        let Some(previous) = self.baseline else {
            debug!("network baseline primed, skipping warm-up sample");
            self.baseline = Some(Baseline { counters, at: now });
            return None;
        };

        let elapsed = now.saturating_duration_since(previous.at).as_secs_f64();
        if elapsed <= 0.0 {
            debug!("no time elapsed since last network sample, discarding");
            return None;
        }

        // Counters that went backwards (interface reset) count as zero traffic
        let sent = counters
            .bytes_sent
            .saturating_sub(previous.counters.bytes_sent);
        let received = counters
            .bytes_recv
            .saturating_sub(previous.counters.bytes_recv);

        self.baseline = Some(Baseline { counters, at: now });

        Some(NetworkMetrics {
            upload_rate: sent as f64 / elapsed,
            download_rate: received as f64 / elapsed,
            total_sent_bytes: counters.bytes_sent,
            total_received_bytes: counters.bytes_recv,
        })
    }
}

impl Collector for NetworkCollector {
    type Sample = Option<NetworkMetrics>;

    fn name(&self) -> &str {
        "network"
    }

    fn collect(&mut self) -> Option<NetworkMetrics> {
        match self.source.net_counters() {
            Ok(counters) => {
                let metrics = self.rate_at(counters, Instant::now());
                if let Some(m) = &metrics {
                    debug!(up = m.upload_rate, down = m.download_rate, "network sampled");
                }
                metrics
            }
            Err(e) => {
                warn!("Error getting network I/O counters: {}", e);
                Some(NetworkMetrics::default())
            }
        }
    }
}
