use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("image codec error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image buffer error: {0}")]
    Buffer(#[from] mm_core::Error),
    #[error("threshold error: {0}")]
    Threshold(#[from] mm_filter::ThresholdError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("malformed ledger {path}: {reason}")]
    Ledger { path: PathBuf, reason: String },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::Image {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Statistics could not be computed; no ledger row is written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeasureError {
    #[error("contour has no points")]
    EmptyContour,
    #[error("mask is empty after erosion")]
    EmptyMask,
    #[error("contour encloses zero area (m00 = 0)")]
    ZeroArea,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parsing config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
