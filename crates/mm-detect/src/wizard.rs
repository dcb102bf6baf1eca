//! Interactive connection wizard
//!
//! Enumerates serial ports, probes each for a memory-map device and lets the
//! user pick one. When exactly one port answers the probe it is selected
//! without prompting.

use std::io::{BufRead, Write};

use tracing::info;

use crate::error::DetectError;
use crate::probe::{discover, Candidate, ProbeConfig};
use crate::scanner::PortScanner;

/// Connection wizard
pub struct ConnectWizard {
    scanner: PortScanner,
    baud_rate: u32,
    probe: ProbeConfig,
}

impl ConnectWizard {
    /// Create a wizard probing at `baud_rate`
    pub fn new(baud_rate: u32) -> Self {
        Self {
            scanner: PortScanner::new(),
            baud_rate,
            probe: ProbeConfig::default(),
        }
    }

    /// Use a custom scanner
    pub fn with_scanner(mut self, scanner: PortScanner) -> Self {
        self.scanner = scanner;
        self
    }

    /// Use a custom probe configuration
    pub fn with_probe_config(mut self, probe: ProbeConfig) -> Self {
        self.probe = probe;
        self
    }

    /// Enumerate and probe all ports
    pub async fn scan(&self) -> Result<Vec<Candidate>, DetectError> {
        let ports = self.scanner.enumerate_ports()?;
        if ports.is_empty() {
            return Err(DetectError::NoDeviceFound);
        }
        Ok(discover(ports, self.baud_rate, &self.probe).await)
    }

    /// Scan on a private runtime, then prompt; returns the chosen port name
    pub fn run<R: BufRead, W: Write>(&self, input: R, output: W) -> Result<String, DetectError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let candidates = runtime.block_on(self.scan())?;
        choose_port(&candidates, input, output)
    }
}

/// Pick a port from probed candidates
///
/// Auto-selects the only responding device; otherwise lists every port and
/// prompts for an index until a valid one is entered. EOF aborts.
pub fn choose_port<R: BufRead, W: Write>(
    candidates: &[Candidate],
    mut input: R,
    mut output: W,
) -> Result<String, DetectError> {
    if candidates.is_empty() {
        return Err(DetectError::NoDeviceFound);
    }

    let mut responding = candidates.iter().filter(|c| c.probe.is_some());
    if let (Some(only), None) = (responding.next(), responding.next()) {
        let version = only.probe.as_ref().map(|p| p.version.as_str()).unwrap_or("");
        writeln!(output, "Connecting to {} ({})", only.info.display_label(), version)?;
        info!("Auto-selected {}", only.info.port);
        return Ok(only.info.port.clone());
    }

    writeln!(output, "Available ports:")?;
    for (i, candidate) in candidates.iter().enumerate() {
        let status = match &candidate.probe {
            Some(probe) => probe.version.as_str(),
            None => "no response",
        };
        writeln!(output, "  [{}] {} - {}", i, candidate.info.display_label(), status)?;
    }

    let last = candidates.len() - 1;
    let mut line = String::new();
    loop {
        write!(output, "Select port [0-{}]: ", last)?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Err(DetectError::Aborted);
        }

        match line.trim().parse::<usize>() {
            Ok(index) if index <= last => {
                let port = &candidates[index].info.port;
                info!("User selected {}", port);
                return Ok(port.clone());
            }
            _ => writeln!(output, "Invalid selection: {}", line.trim())?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeResult;
    use crate::scanner::SerialPortInfo;

    fn candidate(port: &str, version: Option<&str>) -> Candidate {
        Candidate {
            info: SerialPortInfo::named(port),
            probe: version.map(|v| ProbeResult {
                version: v.to_string(),
            }),
        }
    }

    #[test]
    fn test_no_ports_is_no_device() {
        let err = choose_port(&[], &b""[..], Vec::new()).unwrap_err();
        assert!(matches!(err, DetectError::NoDeviceFound));
    }

    #[test]
    fn test_single_responder_is_auto_selected() {
        let candidates = vec![
            candidate("/dev/ttyS0", None),
            candidate("/dev/ttyACM0", Some("mock-dev 0.1.0")),
        ];
        let mut out = Vec::new();
        let port = choose_port(&candidates, &b""[..], &mut out).unwrap();
        assert_eq!(port, "/dev/ttyACM0");
        assert!(String::from_utf8(out).unwrap().contains("mock-dev 0.1.0"));
    }

    #[test]
    fn test_prompt_until_valid_index() {
        let candidates = vec![
            candidate("/dev/ttyS0", None),
            candidate("/dev/ttyS1", None),
        ];
        let mut out = Vec::new();
        let port = choose_port(&candidates, &b"7\nabc\n1\n"[..], &mut out).unwrap();
        assert_eq!(port, "/dev/ttyS1");

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[0] /dev/ttyS0 - no response"));
        assert!(text.contains("Invalid selection: 7"));
        assert!(text.contains("Invalid selection: abc"));
    }

    #[test]
    fn test_multiple_responders_prompt() {
        let candidates = vec![
            candidate("/dev/ttyACM0", Some("a")),
            candidate("/dev/ttyACM1", Some("b")),
        ];
        let port = choose_port(&candidates, &b"0\n"[..], Vec::new()).unwrap();
        assert_eq!(port, "/dev/ttyACM0");
    }

    #[test]
    fn test_eof_aborts() {
        let candidates = vec![candidate("/dev/ttyS0", None)];
        let err = choose_port(&candidates, &b""[..], Vec::new()).unwrap_err();
        assert!(matches!(err, DetectError::Aborted));
    }
}
