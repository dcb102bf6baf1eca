//! Serial port enumeration
//!
//! Lists the ports the wizard offers, minus ports that are never devices.

use serialport::{available_ports, SerialPortType};
use tracing::{debug, info, warn};

use crate::error::DetectError;

/// A candidate port as shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Port name (e.g., /dev/ttyACM0, COM3)
    pub port: String,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB product string
    pub product: Option<String>,
}

impl SerialPortInfo {
    /// Port with no USB metadata
    pub fn named(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            vid: None,
            pid: None,
            product: None,
        }
    }

    /// Convert an enumerated port, keeping USB identity when known
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                product: usb.product.clone(),
            },
            _ => Self::named(name),
        }
    }

    /// Label shown in the wizard, e.g. `/dev/ttyACM0 (Nucleo) [0483:374B]`
    pub fn display_label(&self) -> String {
        let mut label = self.port.clone();
        if let Some(product) = &self.product {
            label.push_str(&format!(" ({})", product));
        }
        if let (Some(vid), Some(pid)) = (self.vid, self.pid) {
            label.push_str(&format!(" [{:04X}:{:04X}]", vid, pid));
        }
        label
    }
}

/// Which ports enumeration leaves out
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    /// Substrings of port names to leave out
    pub skip_patterns: Vec<String>,
}

/// Enumerates serial ports
pub struct PortScanner {
    config: ScannerConfig,
}

impl PortScanner {
    /// Scanner skipping Bluetooth and debug ports
    pub fn new() -> Self {
        Self {
            config: ScannerConfig {
                skip_patterns: vec![
                    // macOS exposes these for paired Bluetooth devices
                    "Bluetooth".to_string(),
                    "debug".to_string(),
                ],
            },
        }
    }

    /// Scanner with explicit skip patterns
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// List ports that could host a device
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, DetectError> {
        debug!("Enumerating serial ports");
        let ports = available_ports().map_err(|e| DetectError::EnumerationFailed(e.to_string()))?;

        let result = self.filter(
            ports
                .into_iter()
                .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type)),
        );

        if result.is_empty() {
            warn!("No serial ports found");
        } else {
            info!("Found {} serial port(s)", result.len());
            for port in &result {
                debug!("  {}", port.display_label());
            }
        }

        Ok(result)
    }

    /// Drop ports matching a skip pattern
    pub fn filter(&self, ports: impl IntoIterator<Item = SerialPortInfo>) -> Vec<SerialPortInfo> {
        ports
            .into_iter()
            .filter(|p| !self.should_skip_port(p))
            .collect()
    }

    fn should_skip_port(&self, port: &SerialPortInfo) -> bool {
        self.config
            .skip_patterns
            .iter()
            .any(|pattern| port.port.contains(pattern.as_str()))
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}
