use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Root error for every sharesync operation.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Share access error: {0}")]
    ShareAccess(String),

    #[error("Permission denied on share: {0}")]
    Authentication(String),

    #[error("File access error at {path}: {message}")]
    FileAccess { path: PathBuf, message: String },

    #[error("Transfer error: {0}")]
    Transfer(String),

    #[error("Archive processing error: {0}")]
    ArchiveProcessing(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SyncError {
    pub fn file_access(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        SyncError::FileAccess {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Errors that stop an operation before any file is moved.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            SyncError::ShareAccess(_)
                | SyncError::Authentication(_)
                | SyncError::Transfer(_)
                | SyncError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
