//! Error types for the kartka library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for kartka operations.
#[derive(Debug, Error)]
pub enum KartkaError {
    /// Error reading or writing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Image could not be decoded or encoded.
    #[error("Image error for '{path}': {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// In-memory image could not be encoded for a model request.
    #[error("Image encoding error: {0}")]
    Encode(String),

    /// Transport-level failure talking to the model endpoint or the archive.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The model endpoint answered, but not with a usable completion.
    #[error("Model error: {0}")]
    Model(String),

    /// Region configuration is missing a variant or holds an invalid rectangle.
    #[error("Region config error: {0}")]
    RegionConfig(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller input rejected before any pipeline work began.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Failure writing or reading persisted JSON state.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Background job failure.
    #[error("Job error: {0}")]
    Job(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KartkaError {
    /// Wrap an IO error together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap an image error together with the path it concerns.
    pub fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::Image {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for kartka operations.
pub type Result<T> = std::result::Result<T, KartkaError>;
