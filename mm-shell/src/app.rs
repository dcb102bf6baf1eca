//! Startup and teardown of the shell process

use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use mm_protocol::MemoryMap;
use mm_sim::DeviceLoopHandle;
use serialport::SerialPort;
use tracing::{error, info, warn};

use crate::cli::Cli;
use crate::connect::{acquire_driver, DriverSource, SerialConnector};
use crate::driver::MockIf;
use crate::error::ShellError;
use crate::history::History;
use crate::session::{spawn_interrupt_watcher, Session};
use crate::shell::Shell;

/// Exit status when startup fails
pub const EXIT_STARTUP_FAILURE: u8 = 1;
/// Exit status when the command loop ends with an error
pub const EXIT_RUNTIME_FAILURE: u8 = 2;

/// Driver type used by the binary for both real and simulated devices
pub type SerialDriver = MockIf<Box<dyn SerialPort>>;

/// Load the memory map from `path`, or the built-in one
pub fn load_map(path: Option<&Path>) -> Result<MemoryMap> {
    match path {
        Some(path) => MemoryMap::load(path)
            .with_context(|| format!("failed to load memory map {}", path.display())),
        None => Ok(MemoryMap::mock()),
    }
}

/// Start a simulated device and a driver talking to it
///
/// The device serves the internal end of a virtual port pair from a
/// background loop; the driver gets the external end.
#[cfg(unix)]
pub fn start_simulation(map: &MemoryMap) -> Result<(SerialDriver, DeviceLoopHandle), ShellError> {
    let pair = mm_sim::create_pair()?;
    if let Some(name) = pair.ext_port_name() {
        info!("Simulated device on {}", name);
    }

    let device_loop = mm_sim::MockDevice::new(map.clone()).start_loop(pair.mock_port)?;
    let port: Box<dyn SerialPort> = Box::new(pair.ext_port);
    Ok((MockIf::new(port, map.clone()), device_loop))
}

#[cfg(not(unix))]
pub fn start_simulation(_map: &MemoryMap) -> Result<(SerialDriver, DeviceLoopHandle), ShellError> {
    Err(mm_sim::SimError::TransportAllocation(
        "virtual ports need a unix pseudo-terminal".to_string(),
    )
    .into())
}

/// Build the shell and its session from the command line
pub fn start(cli: &Cli) -> Result<(Shell<SerialDriver>, Arc<Session>)> {
    let map = load_map(cli.mm_path.as_deref())?;
    let history = match cli.history_path() {
        Some(path) => History::load(path),
        None => {
            warn!("No home directory; history will not be saved");
            History::in_memory()
        }
    };

    let (prebuilt, device_loop) = if cli.sim {
        let (driver, device_loop) =
            start_simulation(&map).context("failed to start simulated device")?;
        (Some(driver), Some(device_loop))
    } else {
        (None, None)
    };

    let source = DriverSource::from_options(prebuilt, cli.port.clone());
    let mut connector = SerialConnector::new(cli.baudrate, map);
    let driver = acquire_driver(source, &mut connector).context("failed to connect to device")?;

    let session = Arc::new(Session::new(history.clone(), device_loop));
    let mut shell = Shell::new(driver, history);
    if let Some(health) = session.health() {
        shell = shell.with_health(health);
    }
    Ok((shell, session))
}

/// Run the shell on the terminal until it exits
pub fn run(cli: &Cli) -> ExitCode {
    let (mut shell, session) = match start(cli) {
        Ok(started) => started,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };

    if let Err(e) = spawn_interrupt_watcher(session.clone()) {
        warn!("Ctrl-C will not save history: {}", e);
    }

    let stdin = io::stdin();
    let result = shell.cmdloop(stdin.lock(), io::stdout());
    // Runs however the loop ended
    let stopped = session.shutdown();

    match result.and(stopped) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_RUNTIME_FAILURE)
        }
    }
}
