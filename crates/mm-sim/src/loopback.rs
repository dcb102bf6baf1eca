//! In-process endpoint answered synchronously by a [`MockDevice`]
//!
//! Bytes written to the port are framed and handled immediately; responses
//! are queued for the next reads. Reading with nothing queued reports a
//! timeout, like a serial port with no incoming data.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};

use mm_protocol::{EncodeMessage, ProtocolCodec, RequestCodec};

use crate::device::MockDevice;

/// Serial-like endpoint backed directly by a mock device
#[derive(Debug)]
pub struct LoopbackPort {
    device: MockDevice,
    codec: RequestCodec,
    pending: VecDeque<u8>,
    /// Log of every chunk written to the port
    sent_log: Vec<Vec<u8>>,
}

impl LoopbackPort {
    /// Wrap a device
    pub fn new(device: MockDevice) -> Self {
        Self {
            device,
            codec: RequestCodec::new(),
            pending: VecDeque::new(),
            sent_log: Vec::new(),
        }
    }

    /// The device behind the port
    pub fn device(&self) -> &MockDevice {
        &self.device
    }

    /// All chunks written so far
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent_log
    }

    /// Queue raw bytes for the reader, bypassing the device
    pub fn inject(&mut self, data: &[u8]) {
        self.pending.extend(data);
    }
}

impl Read for LoopbackPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            return Err(io::Error::new(ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for LoopbackPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sent_log.push(buf.to_vec());
        self.codec.push_bytes(buf);
        while let Some(request) = self.codec.next_message() {
            let response = self.device.handle_request(&request);
            self.pending.extend(response.encode());
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mm_protocol::{MemoryMap, Response};

    #[test]
    fn test_write_then_read_response() {
        let mut port = LoopbackPort::new(MockDevice::new(MemoryMap::mock()));

        let mut buf = [0u8; 128];
        assert_eq!(
            port.read(&mut buf).unwrap_err().kind(),
            ErrorKind::TimedOut
        );

        port.write_all(b"special_cmd 9\n").unwrap();
        let n = port.read(&mut buf).unwrap();
        let response = Response::parse(std::str::from_utf8(&buf[..n]).unwrap()).unwrap();
        assert_eq!(response.data_int(), Some(10));
        assert_eq!(port.sent_data(), &[b"special_cmd 9\n".to_vec()]);
        assert_eq!(port.device().requests_served(), 1);
    }

    #[test]
    fn test_inject_bypasses_device() {
        let mut port = LoopbackPort::new(MockDevice::new(MemoryMap::mock()));
        port.inject(b"xy");
        let mut buf = [0u8; 1];
        assert_eq!(port.read(&mut buf).unwrap(), 1);
        assert_eq!(&buf, b"x");
        assert_eq!(port.read(&mut buf).unwrap(), 1);
        assert_eq!(&buf, b"y");
    }
}
