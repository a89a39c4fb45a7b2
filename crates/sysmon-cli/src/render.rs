//! Text rendering of metric sections.

use std::fmt::Write;
use sysmon_core::display::{MetricValue, MetricsSection, RateGraph, SectionColor};

/// Graphs never scale below this peak, in KB/s.
const GRAPH_FLOOR_KBPS: f64 = 10.0;

const LABEL_WIDTH: usize = 10;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

/// Moves the cursor home and clears the screen.
pub const CLEAR_SCREEN: &str = "\x1b[H\x1b[2J";

fn ansi(color: SectionColor) -> &'static str {
    match color {
        SectionColor::SkyBlue => "\x1b[96m",
        SectionColor::Green => "\x1b[92m",
        SectionColor::Orange => "\x1b[33m",
        SectionColor::Violet => "\x1b[95m",
    }
}

/// Creates a progress bar string.
/// Returns something like "[########........]"
fn ascii_bar(percent: f64, width: usize) -> String {
    let filled = ((percent / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    let empty = width - filled;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(empty))
}

/// Creates a sparkline from historical data.
/// Uses characters to represent different heights:
/// `_` (lowest), `.`, `-`, `=`, `+`, `*`, `#` (highest)
fn sparkline(data: &[f64], max_value: f64, width: usize) -> String {
    const CHARS: [char; 7] = ['_', '.', '-', '=', '+', '*', '#'];

    if data.is_empty() || max_value <= 0.0 {
        return "_".repeat(width);
    }

    let num_points = data.len();
    let mut result = String::with_capacity(width);

    for i in 0..width {
        let data_idx = if width <= num_points {
            // More data than width: keep the most recent points
            num_points - width + i
        } else {
            // Less data than width: stretch
            (i * num_points) / width
        };

        let value = data.get(data_idx).copied().unwrap_or(0.0);
        let normalized = (value / max_value).clamp(0.0, 1.0);
        let level = (normalized * (CHARS.len() - 1) as f64).round() as usize;
        result.push(CHARS[level.min(CHARS.len() - 1)]);
    }

    result
}

/// Peak used to scale a graph.
fn graph_scale(data: &[f64]) -> f64 {
    data.iter().copied().fold(GRAPH_FLOOR_KBPS, f64::max)
}

/// Renders sections as a text dashboard.
pub struct TextRenderer {
    color: bool,
    bar_width: usize,
}

impl TextRenderer {
    /// Creates a new text renderer.
    pub fn new(color: bool, bar_width: usize) -> Self {
        Self { color, bar_width }
    }

    fn paint<'a>(&self, code: &'a str) -> &'a str {
        if self.color {
            code
        } else {
            ""
        }
    }

    /// Renders one full frame.
    pub fn render(&self, sections: &[MetricsSection]) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{}System Monitor{}",
            self.paint(BOLD),
            self.paint(RESET)
        );
        for section in sections {
            out.push('\n');
            self.render_section(&mut out, section);
        }
        out
    }

    fn render_section(&self, out: &mut String, section: &MetricsSection) {
        let accent = self.paint(ansi(section.color));
        let reset = self.paint(RESET);
        let _ = writeln!(out, "{}{}{}{}", self.paint(BOLD), accent, section.title, reset);

        if let Some(graph) = &section.graph {
            self.render_graph(out, graph, accent, reset);
        }

        for metric in &section.metrics {
            let label = if metric.label.is_empty() {
                String::new()
            } else {
                format!("{}:", metric.label)
            };
            match metric.value {
                MetricValue::Percentage(percent) => {
                    let _ = writeln!(
                        out,
                        "  {}{}{} {}",
                        accent,
                        ascii_bar(percent, self.bar_width),
                        reset,
                        metric.formatted()
                    );
                }
                _ => {
                    let _ = writeln!(
                        out,
                        "  {:<width$} {}",
                        label,
                        metric.formatted(),
                        width = LABEL_WIDTH
                    );
                }
            }
        }
    }

    fn render_graph(&self, out: &mut String, graph: &RateGraph, accent: &str, reset: &str) {
        let dim = self.paint(DIM);
        for (name, data) in [("Up", &graph.upload), ("Down", &graph.download)] {
            let peak = graph_scale(data);
            let current = data.last().copied().unwrap_or(0.0);
            let _ = writeln!(
                out,
                "  {:<width$} {}{}{} {:.1} KB/s {}Peak: {:.1} KB/s{}",
                name,
                accent,
                sparkline(data, peak, self.bar_width),
                reset,
                current,
                dim,
                peak,
                reset,
                width = LABEL_WIDTH
            );
        }
    }
}
