//! Requests sent from the shell to the device
//!
//! Requests are ASCII lines terminated by `\n`:
//!
//! ```text
//! rr <offset> <size>          read register bytes
//! wr <offset> <b0> [b1 ...]   stage register bytes
//! ex                          commit staged writes
//! mcu_rst                     reset registers to defaults
//! -v                          firmware version
//! special_cmd [value]         illustrative device command
//! ```

use crate::error::ParseError;
use crate::{parse_int, EncodeMessage};

/// A request to the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Read `size` bytes starting at `offset`
    ReadRegister { offset: u32, size: u32 },
    /// Stage `data` starting at `offset`
    WriteRegister { offset: u32, data: Vec<u8> },
    /// Commit staged writes
    Execute,
    /// Reset every register to its default
    ResetMcu,
    /// Query the firmware version
    Version,
    /// Illustrative command with an optional argument
    Special { value: Option<i64> },
    /// A line the device could not parse
    Unknown(String),
}

impl Request {
    /// Parse a request line (without terminator)
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut words = line.split_whitespace();
        let keyword = words.next().ok_or(ParseError::Empty)?;
        let args: Vec<&str> = words.collect();

        let expect = |expected: &str, ok: bool| {
            if ok {
                Ok(())
            } else {
                Err(ParseError::ArgumentCount {
                    command: keyword.to_string(),
                    expected: expected.to_string(),
                    actual: args.len(),
                })
            }
        };

        match keyword {
            "rr" => {
                expect("2", args.len() == 2)?;
                Ok(Request::ReadRegister {
                    offset: parse_number(args[0])?,
                    size: parse_number(args[1])?,
                })
            }
            "wr" => {
                expect("at least 2", args.len() >= 2)?;
                let data = args[1..]
                    .iter()
                    .map(|b| parse_number::<u8>(b))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Request::WriteRegister {
                    offset: parse_number(args[0])?,
                    data,
                })
            }
            "ex" => {
                expect("0", args.is_empty())?;
                Ok(Request::Execute)
            }
            "mcu_rst" => {
                expect("0", args.is_empty())?;
                Ok(Request::ResetMcu)
            }
            "-v" => {
                expect("0", args.is_empty())?;
                Ok(Request::Version)
            }
            "special_cmd" => {
                expect("0 or 1", args.len() <= 1)?;
                let value = args
                    .first()
                    .map(|v| parse_int(v).ok_or_else(|| ParseError::InvalidNumber(v.to_string())))
                    .transpose()?;
                Ok(Request::Special { value })
            }
            other => Err(ParseError::UnknownCommand(other.to_string())),
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Request::ReadRegister { .. } => "rr",
            Request::WriteRegister { .. } => "wr",
            Request::Execute => "ex",
            Request::ResetMcu => "mcu_rst",
            Request::Version => "-v",
            Request::Special { .. } => "special_cmd",
            Request::Unknown(_) => "unknown",
        }
    }
}

fn parse_number<T: TryFrom<i64>>(s: &str) -> Result<T, ParseError> {
    parse_int(s)
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| ParseError::InvalidNumber(s.to_string()))
}

impl EncodeMessage for Request {
    fn encode(&self) -> Vec<u8> {
        let line = match self {
            Request::ReadRegister { offset, size } => format!("rr {} {}", offset, size),
            Request::WriteRegister { offset, data } => {
                let bytes: Vec<String> = data.iter().map(|b| b.to_string()).collect();
                format!("wr {} {}", offset, bytes.join(" "))
            }
            Request::Execute => "ex".to_string(),
            Request::ResetMcu => "mcu_rst".to_string(),
            Request::Version => "-v".to_string(),
            Request::Special { value: Some(v) } => format!("special_cmd {}", v),
            Request::Special { value: None } => "special_cmd".to_string(),
            Request::Unknown(line) => line.clone(),
        };
        let mut bytes = line.into_bytes();
        bytes.push(b'\n');
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_read() {
        assert_eq!(
            Request::parse("rr 6 2").unwrap(),
            Request::ReadRegister { offset: 6, size: 2 }
        );
        assert_eq!(
            Request::parse("rr 0x10 4").unwrap(),
            Request::ReadRegister { offset: 16, size: 4 }
        );
    }

    #[test]
    fn test_parse_write() {
        assert_eq!(
            Request::parse("wr 12 1 2 0xff").unwrap(),
            Request::WriteRegister {
                offset: 12,
                data: vec![1, 2, 255]
            }
        );
        assert!(matches!(
            Request::parse("wr 12 256"),
            Err(ParseError::InvalidNumber(_))
        ));
        assert!(matches!(
            Request::parse("wr 12"),
            Err(ParseError::ArgumentCount { .. })
        ));
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Request::parse("ex").unwrap(), Request::Execute);
        assert_eq!(Request::parse("mcu_rst").unwrap(), Request::ResetMcu);
        assert_eq!(Request::parse(" -v ").unwrap(), Request::Version);
        assert!(Request::parse("ex 1").is_err());
    }

    #[test]
    fn test_parse_special() {
        assert_eq!(
            Request::parse("special_cmd").unwrap(),
            Request::Special { value: None }
        );
        assert_eq!(
            Request::parse("special_cmd -5").unwrap(),
            Request::Special { value: Some(-5) }
        );
        assert!(Request::parse("special_cmd 1 2").is_err());
        assert!(Request::parse("special_cmd abc").is_err());
    }

    #[test]
    fn test_parse_unknown_and_empty() {
        assert_eq!(
            Request::parse("bogus 1"),
            Err(ParseError::UnknownCommand("bogus".into()))
        );
        assert_eq!(Request::parse("   "), Err(ParseError::Empty));
    }

    #[test]
    fn test_encode() {
        assert_eq!(
            Request::WriteRegister {
                offset: 6,
                data: vec![1, 0]
            }
            .encode(),
            b"wr 6 1 0\n"
        );
        assert_eq!(Request::Special { value: Some(3) }.encode(), b"special_cmd 3\n");
        assert_eq!(Request::Version.encode(), b"-v\n");
    }
}
