//! Error handling for the netradar engine

use thiserror::Error;

/// Main error type for radar operations
#[derive(Debug, Error)]
pub enum RadarError {
    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid network range: {0}")]
    InvalidRange(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for radar operations
pub type RadarResult<T> = Result<T, RadarError>;
