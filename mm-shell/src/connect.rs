//! Driver acquisition
//!
//! The shell gets its driver exactly one way, decided once at startup:
//! a pre-built driver wins, otherwise a port name opens that port, otherwise
//! the connection wizard picks one.

use std::io;

use mm_detect::ConnectWizard;
use mm_protocol::MemoryMap;
use serialport::SerialPort;
use tracing::info;

use crate::driver::MockIf;
use crate::error::ShellError;

/// Where the shell's driver comes from
pub enum DriverSource<D> {
    /// Already constructed, e.g. over a virtual port pair
    Prebuilt(D),
    /// Run the interactive connection wizard
    Wizard,
    /// Open the named port
    Port(String),
}

impl<D> DriverSource<D> {
    /// Resolve the startup options into a source
    pub fn from_options(prebuilt: Option<D>, port: Option<String>) -> Self {
        match (prebuilt, port) {
            (Some(driver), _) => DriverSource::Prebuilt(driver),
            (None, Some(port)) => DriverSource::Port(port),
            (None, None) => DriverSource::Wizard,
        }
    }
}

/// Constructs drivers for real ports
pub trait Connector {
    type Driver;

    /// Open a driver on a named port
    fn connect_port(&mut self, port: &str) -> Result<Self::Driver, ShellError>;

    /// Discover a device interactively and open a driver on it
    fn run_wizard(&mut self) -> Result<Self::Driver, ShellError>;
}

/// Obtain the shell's driver from `source`
pub fn acquire_driver<C: Connector>(
    source: DriverSource<C::Driver>,
    connector: &mut C,
) -> Result<C::Driver, ShellError> {
    match source {
        DriverSource::Prebuilt(driver) => Ok(driver),
        DriverSource::Port(port) => {
            info!("Connecting to {}", port);
            connector.connect_port(&port)
        }
        DriverSource::Wizard => {
            info!("No port given, starting connection wizard");
            connector.run_wizard()
        }
    }
}

/// Connector for serial ports using the terminal for the wizard
pub struct SerialConnector {
    baud_rate: u32,
    map: MemoryMap,
}

impl SerialConnector {
    pub fn new(baud_rate: u32, map: MemoryMap) -> Self {
        Self { baud_rate, map }
    }
}

impl Connector for SerialConnector {
    type Driver = MockIf<Box<dyn SerialPort>>;

    fn connect_port(&mut self, port: &str) -> Result<Self::Driver, ShellError> {
        MockIf::open(port, self.baud_rate, self.map.clone())
    }

    fn run_wizard(&mut self) -> Result<Self::Driver, ShellError> {
        let stdin = io::stdin();
        let port = ConnectWizard::new(self.baud_rate).run(stdin.lock(), io::stdout())?;
        self.connect_port(&port)
    }
}
