//! Device driver used by the shell
//!
//! [`DeviceDriver`] is the capability the command handlers see. [`MockIf`]
//! implements it over any byte stream speaking the memory-map protocol: a
//! real serial port, the external end of a virtual pair, or an in-process
//! loopback.

use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use mm_protocol::{
    EncodeMessage, MapError, MemoryMap, ProtocolCodec, Record, Request, Response, ResponseCodec,
};
use serialport::SerialPort;
use tracing::{debug, trace};

use crate::error::{CommandInputError, DriverError, ShellError};

/// Default time to wait for a response line
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Read timeout of the underlying serial port
const PORT_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Operations the shell can perform on a device
pub trait DeviceDriver {
    /// Memory map of the connected device
    fn memory_map(&self) -> &MemoryMap;

    /// Read a record's current value(s)
    fn read_reg(&mut self, name: &str) -> Result<Vec<i64>, DriverError>;

    /// Stage new value(s) for a record
    fn write_reg(&mut self, name: &str, values: &[i64]) -> Result<(), DriverError>;

    /// Apply staged writes
    fn commit(&mut self) -> Result<(), DriverError>;

    /// Reset the device registers to their defaults
    fn reset_mcu(&mut self) -> Result<(), DriverError>;

    /// Firmware version string
    fn version(&mut self) -> Result<String, DriverError>;

    /// Illustrative device command; returns the device's answer
    fn special_cmd(&mut self, value: Option<i64>) -> Result<i64, DriverError>;
}

/// Driver for memory-map devices over a line-oriented byte stream
pub struct MockIf<P> {
    port: P,
    map: MemoryMap,
    codec: ResponseCodec,
    timeout: Duration,
}

impl MockIf<Box<dyn SerialPort>> {
    /// Open a serial port by name
    pub fn open(port_name: &str, baud_rate: u32, map: MemoryMap) -> Result<Self, ShellError> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(PORT_READ_TIMEOUT)
            .open()
            .map_err(|e| ShellError::Connection {
                port: port_name.to_string(),
                reason: e.to_string(),
            })?;
        debug!("Opened {} at {} baud", port_name, baud_rate);
        Ok(Self::new(port, map))
    }
}

impl<P: Read + Write> MockIf<P> {
    /// Wrap an already connected endpoint
    pub fn new(port: P, map: MemoryMap) -> Self {
        Self {
            port,
            map,
            codec: ResponseCodec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the response timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The underlying endpoint
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Send a request and wait for its successful response
    fn transact(&mut self, request: &Request) -> Result<Response, DriverError> {
        // Anything left over belongs to an earlier, abandoned exchange
        self.codec.clear();

        let bytes = request.encode();
        trace!("-> {}", String::from_utf8_lossy(&bytes).trim_end());
        self.port.write_all(&bytes)?;
        self.port.flush()?;

        let deadline = Instant::now() + self.timeout;
        let mut buf = [0u8; 256];
        loop {
            if let Some(response) = self.codec.next_message() {
                trace!("<- {:?}", response);
                if !response.is_success() {
                    return Err(DriverError::Device {
                        request: request.name(),
                        status: response.result,
                        msg: response.msg,
                    });
                }
                return Ok(response);
            }

            if Instant::now() >= deadline {
                return Err(DriverError::Timeout(self.timeout));
            }

            match self.port.read(&mut buf) {
                Ok(0) => thread::sleep(Duration::from_millis(1)),
                Ok(n) => self.codec.push_bytes(&buf[..n]),
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn record(&self, name: &str) -> Result<Record, DriverError> {
        self.map
            .record(name)
            .cloned()
            .map_err(|e| input_error(e).into())
    }
}

fn input_error(e: MapError) -> CommandInputError {
    CommandInputError::Value(e.to_string())
}

fn unexpected(request: &Request, detail: impl Into<String>) -> DriverError {
    DriverError::UnexpectedResponse {
        request: request.name(),
        detail: detail.into(),
    }
}

impl<P: Read + Write> DeviceDriver for MockIf<P> {
    fn memory_map(&self) -> &MemoryMap {
        &self.map
    }

    fn read_reg(&mut self, name: &str) -> Result<Vec<i64>, DriverError> {
        let record = self.record(name)?;
        let size = u32::try_from(record.size())
            .map_err(|_| CommandInputError::Value(format!("{} is too large to read", name)))?;
        let request = Request::ReadRegister {
            offset: record.offset,
            size,
        };
        let response = self.transact(&request)?;
        let bytes = response
            .data_bytes()
            .ok_or_else(|| unexpected(&request, "expected a byte array"))?;
        record
            .decode(&bytes)
            .map_err(|e| unexpected(&request, e.to_string()))
    }

    fn write_reg(&mut self, name: &str, values: &[i64]) -> Result<(), DriverError> {
        let record = self.record(name)?;
        if !record.is_writable() {
            return Err(CommandInputError::Value(format!("{} is read-only", name)).into());
        }
        let data = record.encode(values).map_err(input_error)?;
        self.transact(&Request::WriteRegister {
            offset: record.offset,
            data,
        })?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.transact(&Request::Execute)?;
        Ok(())
    }

    fn reset_mcu(&mut self) -> Result<(), DriverError> {
        self.transact(&Request::ResetMcu)?;
        Ok(())
    }

    fn version(&mut self) -> Result<String, DriverError> {
        let request = Request::Version;
        let response = self.transact(&request)?;
        response
            .data_str()
            .map(str::to_string)
            .ok_or_else(|| unexpected(&request, "expected a version string"))
    }

    fn special_cmd(&mut self, value: Option<i64>) -> Result<i64, DriverError> {
        let request = Request::Special { value };
        let response = self.transact(&request)?;
        response
            .data_int()
            .ok_or_else(|| unexpected(&request, "expected an integer"))
    }
}
