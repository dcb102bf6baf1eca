//! Memory Map Protocol Library
//!
//! This crate provides the memory map model and the wire protocol spoken
//! between the mock shell and a memory-map device:
//!
//! - **MemoryMap**: named, typed records at byte offsets of a register file
//! - **Request**: ASCII command lines (`rr`, `wr`, `ex`, `mcu_rst`, `-v`, `special_cmd`)
//! - **Response**: one JSON object per line with a status and optional payload
//!
//! # Example
//!
//! ```rust
//! use mm_protocol::{EncodeMessage, ProtocolCodec, Request, RequestCodec};
//!
//! let mut codec = RequestCodec::new();
//! codec.push_bytes(&Request::ReadRegister { offset: 6, size: 2 }.encode());
//!
//! assert_eq!(
//!     codec.next_message(),
//!     Some(Request::ReadRegister { offset: 6, size: 2 })
//! );
//! ```

pub mod codec;
pub mod error;
pub mod memory_map;
pub mod request;
pub mod response;

pub use codec::{RequestCodec, ResponseCodec};
pub use error::{MapError, ParseError};
pub use memory_map::{Access, MemoryMap, Record, RegisterType, MAX_RECORD_SIZE};
pub use request::Request;
pub use response::{Response, Status};

/// Trait for codecs that parse a byte stream into messages
pub trait ProtocolCodec {
    /// The message type produced by this codec
    type Message;

    /// Push raw bytes into the codec's buffer
    fn push_bytes(&mut self, data: &[u8]);

    /// Try to extract the next complete message from the buffer
    fn next_message(&mut self) -> Option<Self::Message> {
        self.next_message_with_bytes().map(|(msg, _)| msg)
    }

    /// Try to extract the next complete message along with its raw bytes
    fn next_message_with_bytes(&mut self) -> Option<(Self::Message, Vec<u8>)>;

    /// Clear the internal buffer
    fn clear(&mut self);
}

/// Trait for messages that can be encoded to bytes
pub trait EncodeMessage {
    /// Encode this message to its wire format, including the terminator
    fn encode(&self) -> Vec<u8>;
}

/// Parse an integer in decimal or `0x` hex, with an optional leading `-`
pub fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    let (radix, digits) = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => (16, hex),
        None => (10, digits),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }

    let magnitude = i128::from_str_radix(digits, radix).ok()?;

    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::parse_int;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("0x2A"), Some(42));
        assert_eq!(parse_int("-0x10"), Some(-16));
        assert_eq!(parse_int("-9223372036854775808"), Some(i64::MIN));
        assert_eq!(parse_int("9223372036854775808"), None);
        assert_eq!(parse_int("12a"), None);
        assert_eq!(parse_int("--1"), None);
        assert_eq!(parse_int(""), None);
    }
}
