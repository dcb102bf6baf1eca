//! Memory Map Device Shell
//!
//! Line-oriented shell for reading and writing the registers of a
//! memory-map device over a serial port, or of a simulated device over a
//! virtual port pair.
//!
//! - **DeviceDriver / MockIf**: typed register access over the wire protocol
//! - **Shell**: command loop dispatching through a `CommandTable`
//! - **DriverSource**: how the driver is obtained (pre-built, port or wizard)
//! - **Session**: history persistence and device loop shutdown, run once
//!
//! # Example
//!
//! ```rust
//! use mm_protocol::MemoryMap;
//! use mm_shell::{History, MockIf, Shell};
//! use mm_sim::{LoopbackPort, MockDevice};
//!
//! let map = MemoryMap::mock();
//! let port = LoopbackPort::new(MockDevice::new(map.clone()));
//! let mut shell = Shell::new(MockIf::new(port, map), History::in_memory());
//!
//! let mut out = Vec::new();
//! shell.onecmd("special_cmd 41", &mut out).unwrap();
//! assert_eq!(out, b"42\n");
//! ```

pub mod app;
pub mod cli;
mod commands;
pub mod connect;
pub mod driver;
pub mod error;
pub mod history;
pub mod logging;
pub mod session;
pub mod shell;

pub use cli::Cli;
pub use connect::{acquire_driver, Connector, DriverSource, SerialConnector};
pub use driver::{DeviceDriver, MockIf};
pub use error::{CommandInputError, DriverError, ShellError};
pub use history::History;
pub use logging::LogConfig;
pub use session::Session;
pub use shell::{CommandContext, CommandSpec, CommandTable, Flow, Shell};
