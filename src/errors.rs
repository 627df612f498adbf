//! # Application Error Types
//!
//! This module defines the error type used by the application shell around
//! the binarization core: configuration, image decoding and artifact output.

use std::fmt;

use crate::binarization::BinarizationError;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration validation errors
    Config(String),
    /// Input validation errors (paths, arguments)
    Validation(String),
    /// Image decode/encode errors
    Image(String),
    /// File system errors
    FileSystem(String),
    /// Thresholding or sweep errors from the core
    Binarization(BinarizationError),
    /// Internal application errors
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Validation(msg) => write!(f, "[VALIDATION] {}", msg),
            AppError::Image(msg) => write!(f, "[IMAGE] {}", msg),
            AppError::FileSystem(msg) => write!(f, "[FILESYSTEM] {}", msg),
            AppError::Binarization(err) => write!(f, "[BINARIZATION] {}", err),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Binarization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BinarizationError> for AppError {
    fn from(err: BinarizationError) -> Self {
        AppError::Binarization(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileSystem(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the application
pub mod error_logging {
    use tracing::error;

    /// Log thresholding errors with the parameters that were being applied
    pub fn log_binarization_error(
        error: &impl std::fmt::Display,
        operation: &str,
        label: Option<&str>,
        dimensions: Option<(usize, usize)>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            label = ?label,
            dimensions = ?dimensions,
            "Binarization failed"
        );
    }

    /// Log file system errors with path and operation context
    pub fn log_filesystem_error(
        error: &impl std::fmt::Display,
        operation: &str,
        path: Option<&str>,
        file_size: Option<u64>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path,
            file_size_bytes = ?file_size,
            "File system operation failed"
        );
    }

    /// Log image decode/encode errors with path context
    pub fn log_image_error(error: &impl std::fmt::Display, operation: &str, path: Option<&str>) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path,
            "Image operation failed"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(error: &impl std::fmt::Display, config_key: &str, operation: &str) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }
}
