//! Crate-level error types

use thiserror::Error;

/// Result type for trackdrop operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort service startup or a driver
///
/// Everything inside the per-file pipeline is logged and retried instead of
/// surfacing here; only startup-time problems are fatal.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure to enumerate the watched root
    #[error("Scan error: {0}")]
    Scan(#[from] crate::services::scanner::ScanError),

    /// Filesystem watch subscription error
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}
