//! Error types for the camera web service

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Imaging error: {0}")]
    Imaging(#[from] ImagingError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unable to convert results to JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Camera subsystem errors
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Camera is busy")]
    Busy,

    #[error("Camera did not respond within {0} seconds")]
    Timeout(u64),

    #[error("Failed to start camera process '{command}': {reason}")]
    Spawn { command: String, reason: String },

    #[error("Camera process exited with {status}: {stderr}")]
    ProcessFailed { status: String, stderr: String },

    #[error("Error capturing from camera: {0}")]
    CaptureFailed(String),

    #[error("Unsupported by {backend} backend: {what}")]
    Unsupported { backend: &'static str, what: String },

    #[error("Stream read failed: {0}")]
    StreamRead(String),
}

/// Image post-processing and encoding errors
#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("Invalid image color channel '{0}' specified")]
    InvalidChannel(String),

    #[error("Invalid text color '{0}'")]
    InvalidColor(String),

    #[error("No annotation font available")]
    FontUnavailable,

    #[error("Failed to load font {path}: {reason}")]
    FontLoad { path: String, reason: String },

    #[error("Unable to convert results to an Image: {0}")]
    Encode(String),
}

impl ImagingError {
    /// Whether the error stems from a bad request parameter rather than a
    /// server-side failure
    pub fn is_client_error(&self) -> bool {
        matches!(self, ImagingError::InvalidChannel(_) | ImagingError::InvalidColor(_))
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
