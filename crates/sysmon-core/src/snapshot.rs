//! Aggregate snapshot shared between the sampling tasks and the renderer.

use crate::history::{NetworkHistory, DEFAULT_HISTORY_LEN};
use crate::metrics::{CpuMetrics, DiskMetrics, MemoryMetrics, NetworkMetrics};
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

/// Latest record of every metric family.
///
/// Families that have not been sampled yet hold their zero record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub disk: DiskMetrics,
    pub network: NetworkMetrics,
    pub network_history: NetworkHistory,
}

impl SystemSnapshot {
    /// Creates an all-zero snapshot whose trend buffers hold `history_len` samples.
    pub fn new(history_len: usize) -> Self {
        Self {
            network_history: NetworkHistory::new(history_len),
            ..Default::default()
        }
    }

    /// Stores a network record and appends its rates to the trend buffers.
    pub fn record_network(&mut self, metrics: NetworkMetrics) {
        self.network = metrics;
        self.network_history
            .push(metrics.upload_rate, metrics.download_rate);
    }
}

/// Lock-guarded [`SystemSnapshot`].
///
/// Writers hold the exclusive lock only while copying one record in.
#[derive(Debug)]
pub struct SharedSnapshot {
    inner: RwLock<SystemSnapshot>,
}

impl SharedSnapshot {
    pub fn new(history_len: usize) -> Self {
        Self {
            inner: RwLock::new(SystemSnapshot::new(history_len)),
        }
    }

    /// Returns a copy of the current snapshot.
    pub fn get(&self) -> SystemSnapshot {
        // A writer cannot leave a record half-copied, so a poisoned lock
        // still guards a consistent value.
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Updates the snapshot under the write lock.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut SystemSnapshot),
    {
        let mut snapshot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut snapshot);
    }

    /// Resets every family to its zero record and empties the trend buffers.
    pub fn reset(&self) {
        self.update(|s| {
            let capacity = s.network_history.upload.capacity();
            *s = SystemSnapshot::new(capacity);
        });
    }
}

impl Default for SharedSnapshot {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}
