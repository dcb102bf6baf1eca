//! Error types for device detection

use thiserror::Error;

/// Errors that can occur during detection
#[derive(Debug, Error)]
pub enum DetectError {
    /// Failed to enumerate serial ports
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),

    /// No serial port is available to connect to
    #[error("no device found")]
    NoDeviceFound,

    /// The user left the wizard without choosing a port
    #[error("port selection aborted")]
    Aborted,

    /// I/O error while prompting
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
