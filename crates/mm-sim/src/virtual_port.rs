//! Virtual transport pair
//!
//! Two linked pseudo-terminal endpoints: the mock device drives `mock_port`,
//! the shell drives `ext_port`. Both file descriptors are closed when the
//! endpoints are dropped.

use std::time::Duration;

use serialport::{SerialPort, TTYPort};
use tracing::info;

use crate::error::SimError;

/// Read timeout applied to both endpoints
///
/// Short timeouts keep the device loop responsive to cancellation.
pub const ENDPOINT_TIMEOUT: Duration = Duration::from_millis(50);

/// Nominal baud rate; pseudo-terminals ignore it
const PTY_BAUD: u32 = 115_200;

/// Linked pair of in-process serial endpoints
pub struct VirtualPortPair {
    /// Endpoint driven by the simulated device (pty master)
    pub mock_port: TTYPort,
    /// Endpoint handed to the shell (pty slave, raw mode)
    pub ext_port: TTYPort,
}

impl VirtualPortPair {
    /// OS path of the external endpoint, e.g. `/dev/pts/3`
    pub fn ext_port_name(&self) -> Option<String> {
        self.ext_port.name()
    }
}

/// Allocate a new virtual transport pair
///
/// Fails with [`SimError::TransportAllocation`] when the host has no free
/// pseudo-terminal. The failure is not retried.
pub fn create_pair() -> Result<VirtualPortPair, SimError> {
    let alloc_err = |e: serialport::Error| SimError::TransportAllocation(e.to_string());

    let (mut mock_port, slave) = TTYPort::pair().map_err(alloc_err)?;
    let name = slave.name().ok_or_else(|| {
        SimError::TransportAllocation("pseudo-terminal has no device path".to_string())
    })?;

    // Reopening through the builder puts the slave in raw mode (no echo, no
    // line editing), which the fresh pty does not have
    let ext_port = serialport::new(name.as_str(), PTY_BAUD)
        .timeout(ENDPOINT_TIMEOUT)
        .open_native()
        .map_err(alloc_err)?;
    drop(slave);

    mock_port.set_timeout(ENDPOINT_TIMEOUT).map_err(alloc_err)?;

    info!("Created virtual port pair (ext: {})", name);
    Ok(VirtualPortPair {
        mock_port,
        ext_port,
    })
}
