//! Configuration management.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Frame output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Redrawn text dashboard
    #[default]
    Text,
    /// One JSON snapshot per line
    Json,
}

/// Main configuration structure.
///
/// Nothing here changes how metrics are sampled; only how they are shown.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Frames drawn per second
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Network trend buffer length in samples
    #[serde(default = "default_history")]
    pub history: usize,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Use ANSI colors in text output
    #[serde(default = "default_color")]
    pub color: bool,

    /// Width of percentage bars and graphs in characters
    #[serde(default = "default_bar_width")]
    pub bar_width: usize,
}

// Default value functions
fn default_fps() -> u32 {
    2
}

fn default_history() -> usize {
    sysmon_core::DEFAULT_HISTORY_LEN
}

fn default_color() -> bool {
    true
}

fn default_bar_width() -> usize {
    30
}

const MAX_FPS: u32 = 60;

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse configuration")?;
        Ok(config.sanitized())
    }

    /// Clamps values into their usable ranges.
    fn sanitized(mut self) -> Self {
        self.fps = self.fps.clamp(1, MAX_FPS);
        self.history = self.history.max(2);
        self.bar_width = self.bar_width.max(5);
        self
    }

    /// Time between two frames.
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(1) / self.fps.max(1)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            history: default_history(),
            format: OutputFormat::default(),
            color: default_color(),
            bar_width: default_bar_width(),
        }
    }
}
