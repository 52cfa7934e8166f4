use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for the batch detection run.
///
/// Configuration variants are raised before any file is touched. The remaining
/// variants surface from per-file processing and abort the whole batch.
#[derive(Error, Debug)]
pub enum VisionBatchError {
    #[error("Parameter file '{path}' missing '{key}' parameter.  Please check")]
    MissingParameter { key: String, path: PathBuf },

    #[error("Input directory '{path}' doesn't exist")]
    SourceFolder { path: PathBuf },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Validation error: {field} {reason}")]
    Validation { field: String, reason: String },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing error: {operation} failed (file: {path})")]
    ImageProcessing {
        path: String,
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Prediction error: {operation} failed")]
    Prediction {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Font error: {message}")]
    Font { message: String },
}

pub type Result<T> = std::result::Result<T, VisionBatchError>;

impl VisionBatchError {
    /// Prediction failure that carries a plain message instead of an inner error,
    /// e.g. a non-success HTTP status with the service's response body.
    pub fn prediction_message(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Prediction {
            operation: operation.into(),
            source: message.into().into(),
        }
    }
}

/// Convert I/O errors to filesystem errors.
///
/// Callers with a concrete path should build `FileSystem` directly; this is the
/// fallback for `?` on bare I/O calls.
impl From<std::io::Error> for VisionBatchError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

impl From<image::ImageError> for VisionBatchError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing {
            path: "unknown".to_string(),
            operation: "image processing".to_string(),
            source: Box::new(err),
        }
    }
}

/// Transport and decode failures from the HTTP client count as prediction errors.
impl From<reqwest::Error> for VisionBatchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Prediction {
            operation: "prediction request".to_string(),
            source: Box::new(err),
        }
    }
}

impl From<serde_json::Error> for VisionBatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Configuration {
            message: err.to_string(),
        }
    }
}
