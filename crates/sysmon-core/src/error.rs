//! Error types for the metrics core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors a metric source can report.
///
/// None of these ever reach the presentation layer: collectors log them and
/// substitute the family's zero record.
#[derive(Error, Debug)]
pub enum Error {
    /// A procfs/sysfs file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file was read but its contents did not parse.
    #[error("Malformed data in {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    /// A required field was absent from a stats file.
    #[error("Missing field {field} in {path}")]
    MissingField { path: PathBuf, field: &'static str },

    /// statvfs(3) failed for a mount point.
    #[error("statvfs failed for {mount_point}: {source}")]
    Statvfs {
        mount_point: String,
        #[source]
        source: std::io::Error,
    },

    /// No network interface exposes byte counters.
    #[error("No network interfaces with statistics found")]
    NoInterfaces,
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            detail: detail.into(),
        }
    }
}
