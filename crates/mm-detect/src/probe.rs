//! Device probing
//!
//! Sends a version request to a stream and waits for a successful response
//! to decide whether a memory-map device is listening.

use std::time::Duration;

use mm_protocol::{EncodeMessage, ProtocolCodec, Request, ResponseCodec};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, trace, warn};

use crate::scanner::SerialPortInfo;

/// Result of probing a port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// Firmware version reported by the device
    pub version: String,
}

/// Configuration for probing
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Time allowed for the whole version exchange
    pub timeout: Duration,
    /// Delay after opening a port before probing
    pub settle_delay: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            settle_delay: Duration::from_millis(50),
        }
    }
}

/// Memory-map device prober
pub struct DeviceProber {
    config: ProbeConfig,
}

impl DeviceProber {
    /// Create a new prober with default configuration
    pub fn new() -> Self {
        Self {
            config: ProbeConfig::default(),
        }
    }

    /// Create a prober with custom configuration
    pub fn with_config(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Probe a stream for a memory-map device
    pub async fn probe<S>(&self, stream: &mut S) -> Option<ProbeResult>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        trace!("Sending version probe");
        if let Err(e) = stream.write_all(&Request::Version.encode()).await {
            warn!("Failed to write version probe: {}", e);
            return None;
        }
        if let Err(e) = stream.flush().await {
            trace!("Failed to flush version probe: {}", e);
        }

        let deadline = Instant::now() + self.config.timeout;
        let mut codec = ResponseCodec::new();
        let mut buf = [0u8; 256];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, stream.read(&mut buf)).await {
                Ok(Ok(0)) => {
                    trace!("Stream closed during probe");
                    return None;
                }
                Ok(Ok(n)) => codec.push_bytes(&buf[..n]),
                Ok(Err(e)) => {
                    trace!("Probe read error: {}", e);
                    return None;
                }
                Err(_) => {
                    trace!("Version probe timeout");
                    return None;
                }
            }

            if let Some(response) = codec.next_message() {
                return match (response.is_success(), response.data_str()) {
                    (true, Some(version)) => {
                        info!("Identified device running {}", version);
                        Some(ProbeResult {
                            version: version.to_string(),
                        })
                    }
                    _ => {
                        debug!("Unexpected probe response: {:?}", response);
                        None
                    }
                };
            }
        }
    }
}

impl Default for DeviceProber {
    fn default() -> Self {
        Self::new()
    }
}

/// Probe a specific port at a given baud rate
///
/// Returns the probe result if a device answered.
pub async fn probe_port(
    port_name: &str,
    baud_rate: u32,
    config: &ProbeConfig,
) -> Option<ProbeResult> {
    use tokio_serial::SerialPortBuilderExt;

    debug!("Probing {} at {} baud", port_name, baud_rate);

    let mut stream = match tokio_serial::new(port_name, baud_rate)
        .timeout(Duration::from_millis(100))
        .open_native_async()
    {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to open {}: {}", port_name, e);
            return None;
        }
    };

    // Give the port a moment to settle
    tokio::time::sleep(config.settle_delay).await;

    let prober = DeviceProber::with_config(config.clone());
    prober.probe(&mut stream).await
}

/// A port found during discovery, with its probe outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Port information
    pub info: SerialPortInfo,
    /// Probe outcome, `None` if nothing answered
    pub probe: Option<ProbeResult>,
}

/// Probe every port in turn
pub async fn discover(
    ports: Vec<SerialPortInfo>,
    baud_rate: u32,
    config: &ProbeConfig,
) -> Vec<Candidate> {
    let mut candidates = Vec::with_capacity(ports.len());
    for info in ports {
        let probe = probe_port(&info.port, baud_rate, config).await;
        candidates.push(Candidate { info, probe });
    }
    candidates
}
