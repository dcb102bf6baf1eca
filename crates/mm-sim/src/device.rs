//! Mock memory-map device
//!
//! Serves the request/response protocol from an in-memory register file.
//! Writes land in a staged image and become visible to reads after `ex`.

use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::Duration;

use mm_protocol::{
    EncodeMessage, MemoryMap, ProtocolCodec, Request, RequestCodec, Response, Status,
    MAX_RECORD_SIZE,
};
use tracing::{debug, trace, warn};

use crate::device_loop::{DeviceLoop, DeviceLoopHandle};
use crate::error::SimError;

/// Version string reported by default
pub const DEFAULT_VERSION: &str = "mock-dev 0.1.0";

/// Back-off after an end-of-stream read, to avoid spinning
const EOF_BACKOFF: Duration = Duration::from_millis(10);

/// A simulated device exposing a memory map
#[derive(Debug)]
pub struct MockDevice {
    /// Memory map describing the register file
    map: MemoryMap,
    /// Register values visible to reads
    live: Vec<u8>,
    /// Register values written but not yet committed
    staged: Vec<u8>,
    /// Firmware version string
    version: String,
    /// Request framer for the endpoint stream
    codec: RequestCodec,
    /// Number of requests answered
    served: u64,
}

impl MockDevice {
    /// Create a device with every register at its default
    pub fn new(map: MemoryMap) -> Self {
        let image = map.default_image();
        Self {
            map,
            live: image.clone(),
            staged: image,
            version: DEFAULT_VERSION.to_string(),
            codec: RequestCodec::new(),
            served: 0,
        }
    }

    /// Override the reported firmware version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// The device's memory map
    pub fn map(&self) -> &MemoryMap {
        &self.map
    }

    /// Register values visible to reads
    pub fn live_image(&self) -> &[u8] {
        &self.live
    }

    /// Number of requests answered so far
    pub fn requests_served(&self) -> u64 {
        self.served
    }

    /// Answer one request
    pub fn handle_request(&mut self, request: &Request) -> Response {
        self.served += 1;
        match request {
            Request::ReadRegister { offset, size } => self.read(*offset, *size),
            Request::WriteRegister { offset, data } => self.write(*offset, data),
            Request::Execute => {
                self.live.copy_from_slice(&self.staged);
                debug!("Committed staged registers");
                Response::success()
            }
            Request::ResetMcu => {
                self.live = self.map.default_image();
                self.staged = self.live.clone();
                debug!("Registers reset to defaults");
                Response::success()
            }
            Request::Version => Response::with_data(self.version.as_str()),
            Request::Special { value } => Response::with_data(value.unwrap_or(0).wrapping_add(1)),
            Request::Unknown(line) => Response::error(Status::InvalidCommand, line.as_str()),
        }
    }

    fn span(&self, offset: u32, size: usize) -> Option<std::ops::Range<usize>> {
        let start = offset as usize;
        let end = start.checked_add(size)?;
        (end <= self.live.len()).then_some(start..end)
    }

    fn read(&self, offset: u32, size: u32) -> Response {
        match self.span(offset, size as usize) {
            // Reply must fit in one line
            Some(span) if span.len() > MAX_RECORD_SIZE => Response::error(
                Status::InvalidArgs,
                format!("{} bytes exceeds the {} byte read limit", size, MAX_RECORD_SIZE),
            ),
            Some(span) => Response::with_data(self.live[span].to_vec()),
            None => Response::error(
                Status::OutOfRange,
                format!("{}+{} exceeds {} bytes", offset, size, self.live.len()),
            ),
        }
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Response {
        let Some(span) = self.span(offset, data.len()) else {
            return Response::error(
                Status::OutOfRange,
                format!("{}+{} exceeds {} bytes", offset, data.len(), self.live.len()),
            );
        };

        if let Some(record) = self.map.records_in(span.clone()).find(|r| !r.is_writable()) {
            return Response::error(Status::ReadOnly, record.name.as_str());
        }

        self.staged[span].copy_from_slice(data);
        Response::success()
    }

    /// Run one emulated request/response cycle on `port`
    ///
    /// Read timeouts are idle iterations. Any other I/O error ends the cycle
    /// with an error.
    pub fn serve<P: Read + Write>(&mut self, port: &mut P) -> Result<(), SimError> {
        let mut buf = [0u8; 256];
        let n = match port.read(&mut buf) {
            Ok(0) => {
                thread::sleep(EOF_BACKOFF);
                return Ok(());
            }
            Ok(n) => n,
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                return Ok(())
            }
            Err(e) => {
                warn!("Mock device read error: {}", e);
                return Err(e.into());
            }
        };

        trace!("Mock device received {:?}", String::from_utf8_lossy(&buf[..n]));
        self.codec.push_bytes(&buf[..n]);

        let mut answered = false;
        while let Some(request) = self.codec.next_message() {
            let response = self.handle_request(&request);
            debug!("{} -> {:?}", request.name(), response.result);
            port.write_all(&response.encode())?;
            answered = true;
        }
        if answered {
            port.flush()?;
        }
        Ok(())
    }

    /// Serve requests on `endpoint` from a background device loop
    pub fn start_loop<E>(mut self, endpoint: E) -> Result<DeviceLoopHandle, SimError>
    where
        E: Read + Write + Send + 'static,
    {
        DeviceLoop::start(endpoint, move |port: &mut E| self.serve(port))
    }
}
