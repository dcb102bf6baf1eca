//! Memory Map Device Simulation Library
//!
//! This crate lets the shell talk to a device without hardware. It includes:
//!
//! - **VirtualPortPair**: two linked pseudo-terminal endpoints (unix only)
//! - **DeviceLoop**: runs a device body on a background thread until cancelled
//! - **MockDevice**: serves the memory-map protocol from an in-memory register file
//! - **LoopbackPort**: synchronous in-process endpoint answered by a `MockDevice`
//!
//! # Example
//!
//! ```rust,no_run
//! use mm_protocol::MemoryMap;
//! use mm_sim::{create_pair, MockDevice};
//!
//! let pair = create_pair().unwrap();
//! let mut device_loop = MockDevice::new(MemoryMap::mock())
//!     .start_loop(pair.mock_port)
//!     .unwrap();
//!
//! // ... talk to the device through pair.ext_port ...
//!
//! device_loop.stop().unwrap();
//! ```

pub mod device;
pub mod device_loop;
pub mod error;
pub mod loopback;
#[cfg(unix)]
pub mod virtual_port;

pub use device::MockDevice;
pub use device_loop::{CancelToken, DeviceLoop, DeviceLoopHandle, LoopHealth};
pub use error::SimError;
pub use loopback::LoopbackPort;
#[cfg(unix)]
pub use virtual_port::{create_pair, VirtualPortPair};
