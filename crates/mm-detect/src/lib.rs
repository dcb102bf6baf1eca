//! Memory Map Device Detection Library
//!
//! This crate provides serial port enumeration, probing for memory-map
//! devices and the interactive connection wizard used when no port is given.
//!
//! # Example
//!
//! ```rust,no_run
//! use mm_detect::ConnectWizard;
//!
//! let wizard = ConnectWizard::new(115_200);
//! let stdin = std::io::stdin();
//! let port = wizard.run(stdin.lock(), std::io::stdout()).unwrap();
//! println!("Selected {}", port);
//! ```

pub mod error;
pub mod probe;
pub mod scanner;
pub mod wizard;

pub use error::DetectError;
pub use probe::{discover, probe_port, Candidate, DeviceProber, ProbeConfig, ProbeResult};
pub use scanner::{PortScanner, ScannerConfig, SerialPortInfo};
pub use wizard::{choose_port, ConnectWizard};
