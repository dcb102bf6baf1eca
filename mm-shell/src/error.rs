//! Error types for the shell

use std::time::Duration;

use mm_detect::DetectError;
use mm_protocol::{MapError, Status};
use mm_sim::SimError;
use thiserror::Error;

/// Malformed input to a shell command
///
/// These are reported at the command boundary and never end the loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandInputError {
    /// Wrong number of arguments
    #[error("{command}() takes {expected} argument(s) but {actual} were given")]
    Arity {
        command: String,
        expected: String,
        actual: usize,
    },

    /// An argument has the right shape but an unusable value
    #[error("invalid value: {0}")]
    Value(String),

    /// The argument text could not be tokenized
    #[error("invalid syntax: {0}")]
    Syntax(String),
}

/// Errors raised by a device driver
#[derive(Debug, Error)]
pub enum DriverError {
    /// Caller passed malformed input
    #[error(transparent)]
    Input(#[from] CommandInputError),

    /// Device did not answer in time
    #[error("no response from device within {0:?}")]
    Timeout(Duration),

    /// Device answered with a failure status
    #[error("device rejected {request}: {}{}", .status.describe(), .msg.as_deref().map(|m| format!(" ({})", m)).unwrap_or_default())]
    Device {
        request: &'static str,
        status: Status,
        msg: Option<String>,
    },

    /// Device answered with an unexpected payload
    #[error("unexpected response to {request}: {detail}")]
    UnexpectedResponse {
        request: &'static str,
        detail: String,
    },

    /// I/O error on the port
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that end startup or the command loop
#[derive(Debug, Error)]
pub enum ShellError {
    /// Malformed command input (caught by the command loop)
    #[error(transparent)]
    Input(#[from] CommandInputError),

    /// The named port could not be opened
    #[error("failed to connect to {port}: {reason}")]
    Connection { port: String, reason: String },

    /// Discovery failed, including when no device was found
    #[error(transparent)]
    Detect(#[from] DetectError),

    /// Virtual transport allocation or simulated device failure
    #[error(transparent)]
    DeviceSimulation(#[from] SimError),

    /// Driver failure other than malformed input
    #[error(transparent)]
    Driver(DriverError),

    /// Memory map could not be loaded
    #[error(transparent)]
    Map(#[from] MapError),

    /// Terminal I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DriverError> for ShellError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::Input(input) => ShellError::Input(input),
            other => ShellError::Driver(other),
        }
    }
}
