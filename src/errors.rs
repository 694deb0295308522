use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for the superpixel segmentation pipeline.
///
/// # Fatal versus recoverable
///
/// `InvalidInput`, `NotFound` and `InvalidRegion` abort the current item and are
/// propagated unchanged. `UnreadableFile` is only produced by the batch driver,
/// which logs it and moves on to the next file.
#[derive(Error, Debug)]
pub enum SuperpixelError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Image not found: {path:?}")]
    NotFound { path: PathBuf },

    #[error("Invalid crop bounding box: ({x1}, {y1}, {x2}, {y2})")]
    InvalidRegion { x1: i64, y1: i64, x2: i64, y2: i64 },

    #[error("Could not read image: {path:?}")]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

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

    #[error("Validation error: {field} {reason}")]
    Validation { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, SuperpixelError>;

impl SuperpixelError {
    /// Whether the batch driver may skip the offending file and continue.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnreadableFile { .. })
    }
}

/// Convert I/O errors to filesystem errors.
///
/// Code that has a path and operation at hand should construct
/// `SuperpixelError::FileSystem` directly instead of relying on this fallback.
impl From<std::io::Error> for SuperpixelError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

/// Convert image crate errors to image processing errors.
impl From<image::ImageError> for SuperpixelError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing {
            path: "unknown".to_string(),
            operation: "image processing".to_string(),
            source: Box::new(err),
        }
    }
}

/// Convert thread pool construction errors to configuration errors.
impl From<rayon::ThreadPoolBuildError> for SuperpixelError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::Configuration {
            message: format!("worker pool: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unreadable_files_are_recoverable() {
        let unreadable = SuperpixelError::UnreadableFile {
            path: PathBuf::from("broken.png"),
            source: image::ImageError::IoError(std::io::Error::other("truncated")),
        };
        assert!(unreadable.is_recoverable());

        let fatal = [
            SuperpixelError::InvalidInput {
                reason: "Input image is empty".to_string(),
            },
            SuperpixelError::NotFound {
                path: PathBuf::from("missing.png"),
            },
            SuperpixelError::InvalidRegion {
                x1: 10,
                y1: 0,
                x2: 10,
                y2: 5,
            },
        ];
        for err in fatal {
            assert!(!err.is_recoverable(), "{err} should be fatal");
        }
    }

    #[test]
    fn test_invalid_region_message_keeps_caller_coordinates() {
        let err = SuperpixelError::InvalidRegion {
            x1: -5,
            y1: 3,
            x2: -1,
            y2: 9,
        };
        assert_eq!(err.to_string(), "Invalid crop bounding box: (-5, 3, -1, 9)");
    }
}
