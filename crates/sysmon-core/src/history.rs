//! Bounded trend buffers for the network graphs.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of samples kept (one minute at the 1 s cadence).
pub const DEFAULT_HISTORY_LEN: usize = 60;

/// Fixed-capacity series of recent values; the oldest value is evicted first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendBuffer {
    values: VecDeque<f64>,
    capacity: usize,
}

impl TrendBuffer {
    /// Creates an empty buffer. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a value, evicting the oldest one when full.
    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Largest value in the buffer, 0 when empty.
    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TrendBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

/// Upload and download series fed by the network collector.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkHistory {
    pub upload: TrendBuffer,
    pub download: TrendBuffer,
}

impl NetworkHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            upload: TrendBuffer::new(capacity),
            download: TrendBuffer::new(capacity),
        }
    }

    pub fn push(&mut self, upload: f64, download: f64) {
        self.upload.push(upload);
        self.download.push(download);
    }
}
