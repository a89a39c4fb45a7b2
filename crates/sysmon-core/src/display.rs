//! Display model for renderers.
//!
//! Converts a [`SystemSnapshot`] into titled sections of labelled values.
//! Renderers switch on [`MetricValue`] to decide how to draw each item
//! (percentages get a bar, the rest are plain text).

use crate::history::TrendBuffer;
use crate::snapshot::SystemSnapshot;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const BYTES_PER_KB: f64 = 1024.0;

/// Converts a byte count to gigabytes (GiB).
pub fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GB
}

/// Converts a rate in bytes/second to KB/s.
pub fn bytes_to_kb(bytes_per_sec: f64) -> f64 {
    bytes_per_sec / BYTES_PER_KB
}

/// A displayable metric value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// A plain number such as a frequency or a rate.
    Single(f64),
    /// A percentage in [0, 100].
    Percentage(f64),
    /// A used / available pair.
    Dual { used: f64, available: f64 },
}

impl MetricValue {
    /// Formats the value with its unit.
    pub fn format(&self, unit: &str) -> String {
        match self {
            MetricValue::Single(v) => format!("{:.2} {}", v, unit),
            MetricValue::Percentage(v) => format!("{:.2}{}", v, unit),
            MetricValue::Dual { used, available } => {
                format!("{:.2} / {:.2} {}", used, available, unit)
            }
        }
    }
}

/// A labelled value inside a section.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDisplay {
    /// Label, empty for the headline value of a section.
    pub label: &'static str,
    pub value: MetricValue,
    pub unit: &'static str,
}

impl MetricDisplay {
    fn new(label: &'static str, value: MetricValue, unit: &'static str) -> Self {
        Self { label, value, unit }
    }

    /// Formats the value with the item's unit.
    pub fn formatted(&self) -> String {
        self.value.format(self.unit)
    }
}

/// Accent color of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionColor {
    SkyBlue,
    Green,
    Orange,
    Violet,
}

/// Upload/download series in KB/s for line graphs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RateGraph {
    pub upload: Vec<f64>,
    pub download: Vec<f64>,
}

impl RateGraph {
    fn from_history(upload: &TrendBuffer, download: &TrendBuffer) -> Self {
        Self {
            upload: upload.iter().map(bytes_to_kb).collect(),
            download: download.iter().map(bytes_to_kb).collect(),
        }
    }
}

/// One titled block of metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSection {
    pub title: &'static str,
    pub color: SectionColor,
    pub metrics: Vec<MetricDisplay>,
    /// Only set for the network section.
    pub graph: Option<RateGraph>,
}

impl MetricsSection {
    /// Builds the CPU section.
    pub fn cpu(snapshot: &SystemSnapshot) -> Self {
        let cpu = &snapshot.cpu;
        Self {
            title: "CPU",
            color: SectionColor::SkyBlue,
            metrics: vec![
                MetricDisplay::new("", MetricValue::Percentage(cpu.usage_percent), "%"),
                MetricDisplay::new("Frequency", MetricValue::Single(cpu.frequency_mhz), "MHz"),
            ],
            graph: None,
        }
    }

    /// Builds the memory section.
    pub fn memory(snapshot: &SystemSnapshot) -> Self {
        let memory = &snapshot.memory;
        Self {
            title: "Memory",
            color: SectionColor::Green,
            metrics: vec![
                MetricDisplay::new("", MetricValue::Percentage(memory.usage_percent), "%"),
                MetricDisplay::new(
                    "Used",
                    MetricValue::Dual {
                        used: bytes_to_gb(memory.used_bytes),
                        available: bytes_to_gb(memory.available_bytes),
                    },
                    "GB",
                ),
                MetricDisplay::new(
                    "Swap",
                    MetricValue::Dual {
                        used: bytes_to_gb(memory.swap_used_bytes),
                        available: bytes_to_gb(memory.swap_total_bytes),
                    },
                    "GB",
                ),
            ],
            graph: None,
        }
    }

    /// Builds the disk section.
    pub fn disk(snapshot: &SystemSnapshot) -> Self {
        let disk = &snapshot.disk;
        Self {
            title: "Disk",
            color: SectionColor::Orange,
            metrics: vec![
                MetricDisplay::new("", MetricValue::Percentage(disk.usage_percent), "%"),
                MetricDisplay::new(
                    "Used",
                    MetricValue::Dual {
                        used: bytes_to_gb(disk.used_bytes),
                        available: bytes_to_gb(disk.total_bytes),
                    },
                    "GB",
                ),
            ],
            graph: None,
        }
    }

    /// Builds the network section, including the rate graph.
    pub fn network(snapshot: &SystemSnapshot) -> Self {
        let network = &snapshot.network;
        let history = &snapshot.network_history;
        Self {
            title: "Network",
            color: SectionColor::Violet,
            metrics: vec![
                MetricDisplay::new(
                    "Upload",
                    MetricValue::Single(bytes_to_kb(network.upload_rate)),
                    "KB/s",
                ),
                MetricDisplay::new(
                    "Download",
                    MetricValue::Single(bytes_to_kb(network.download_rate)),
                    "KB/s",
                ),
            ],
            graph: Some(RateGraph::from_history(&history.upload, &history.download)),
        }
    }

    /// Builds every section in display order.
    pub fn all(snapshot: &SystemSnapshot) -> Vec<Self> {
        vec![
            Self::cpu(snapshot),
            Self::memory(snapshot),
            Self::disk(snapshot),
            Self::network(snapshot),
        ]
    }
}
