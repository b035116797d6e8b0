//! Error types for the relay daemon.

/// Daemon-level errors: everything that can stop the service itself.
///
/// Per-request failures are not here; they are [`relay_types::RelayFault`]
/// values and travel to the caller inside the response envelope.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for daemon operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
