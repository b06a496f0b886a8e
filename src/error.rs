//! Error types for score extraction, storage and rendering.
//!
//! Fatal conditions (tool failure, empty result set) abort the pipeline.
//! The rest are raised locally and turned into [`crate::Warning`]s by the
//! component that can skip the offending item and continue.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Assessment tool or predictor exited unsuccessfully.
    #[error("`{command}` failed with {status}: {stderr}")]
    ToolInvocationFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// Assessment tool or predictor could not be started.
    #[error("could not start `{command}`: {source}")]
    ToolNotFound {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A distribution payload did not parse into ten numeric values.
    #[error("malformed distribution on line {line}: {reason}")]
    MalformedDistribution { line: usize, reason: String },

    /// A persisted record could not be decoded.
    #[error("corrupt record {}: {reason}", path.display())]
    CorruptRecord { path: PathBuf, reason: String },

    /// Neither model variant is available for an image.
    #[error("no scores available for {0}")]
    NoScoresAvailable(String),

    /// A record references an image that is not in the source directory.
    #[error("source image for {identifier} not found in {}", dir.display())]
    MissingSourceImage { identifier: String, dir: PathBuf },

    /// Nothing was extracted or loaded.
    #[error("no results found")]
    NoResults,

    /// Distribution values violate the length or range invariant.
    #[error("invalid distribution: {0}")]
    InvalidDistribution(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Chart drawing or PNG encoding failed.
    #[error("plot error: {0}")]
    Plot(String),
}

impl Error {
    /// Whether this error must abort the pipeline
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ToolInvocationFailed { .. } | Error::ToolNotFound { .. } | Error::NoResults
        )
    }
}

/// Convenience alias for results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
