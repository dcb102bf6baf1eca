//! Error types for the simulation layer

use thiserror::Error;

/// Errors that can occur while simulating a device
#[derive(Debug, Error)]
pub enum SimError {
    /// The virtual transport pair could not be allocated
    #[error("failed to allocate virtual transport: {0}")]
    TransportAllocation(String),

    /// The background device loop crashed or exited on its own
    #[error("simulated device failed: {0}")]
    DeviceFailed(String),

    /// I/O error on the device endpoint
    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to spawn the device thread
    #[error("failed to spawn device thread: {0}")]
    Spawn(String),
}
