//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Failed to decode image {path}: {message}")]
    ImageDecode { path: PathBuf, message: String },

    #[error("Failed to encode image {path}: {message}")]
    ImageEncode { path: PathBuf, message: String },

    #[error("Subject detection failed: {0}")]
    DetectionFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Cropping found nothing to crop on an image that should have passed
    /// validation. Signals pipeline misuse or a file changed between calls.
    #[error("No subject detected in {0}")]
    NoSubjectDetected(PathBuf),

    #[error("Subject box has no area inside {0}")]
    InvalidCrop(PathBuf),

    #[error("Cannot move {src} to {dst}: different filesystems")]
    CrossDevice { src: PathBuf, dst: PathBuf },

    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create a detection failure error.
    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an image decode error.
    pub fn image_decode(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::ImageDecode {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create an image encode error.
    pub fn image_encode(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::ImageEncode {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a model not found error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the error means the image itself could not be read.
    pub fn is_unreadable_image(&self) -> bool {
        matches!(
            self,
            MediaError::ImageDecode { .. } | MediaError::FileNotFound(_) | MediaError::Io(_)
        )
    }
}
