//! Curator error types.

use std::path::PathBuf;

use thiserror::Error;

pub type CuratorResult<T> = Result<T, CuratorError>;

#[derive(Debug, Error)]
pub enum CuratorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Invalid split ratio {0}: must be within [0, 1]")]
    InvalidSplitRatio(f64),

    #[error("Step failed: {0}")]
    StepFailed(String),

    #[error("Media error: {0}")]
    Media(#[from] dogset_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CuratorError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn step_failed(msg: impl Into<String>) -> Self {
        Self::StepFailed(msg.into())
    }

    /// Check if the error came from the operator's setup rather than the data.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CuratorError::ConfigError(_)
                | CuratorError::DirectoryNotFound(_)
                | CuratorError::InvalidSplitRatio(_)
                | CuratorError::Media(dogset_media::MediaError::FfmpegNotFound)
                | CuratorError::Media(dogset_media::MediaError::FfprobeNotFound)
                | CuratorError::Media(dogset_media::MediaError::ModelNotFound(_))
                | CuratorError::Media(dogset_media::MediaError::CrossDevice { .. })
        )
    }
}

/// Fail with [`CuratorError::DirectoryNotFound`] unless `path` is a directory.
pub fn require_dir(path: &std::path::Path) -> CuratorResult<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(CuratorError::DirectoryNotFound(path.to_path_buf()))
    }
}
