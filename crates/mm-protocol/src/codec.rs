//! Streaming line codecs
//!
//! Both directions of the protocol are newline framed. The codecs buffer
//! partial input and yield one message per complete line.

use tracing::warn;

use crate::request::Request;
use crate::response::Response;
use crate::ProtocolCodec;

/// Longest line accepted before the buffer is trimmed
pub const MAX_LINE_LEN: usize = 4096;

/// Newline framer shared by the request and response codecs
#[derive(Debug, Default)]
struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // Prevent unbounded growth when no terminator ever arrives
        if self.buffer.len() > MAX_LINE_LEN * 4 && !self.buffer.contains(&b'\n') {
            let start = self.buffer.len() - MAX_LINE_LEN;
            self.buffer = self.buffer[start..].to_vec();
        }
    }

    /// Next complete line with its raw bytes; blank lines are skipped
    fn next_line(&mut self) -> Option<(String, Vec<u8>)> {
        loop {
            let term_pos = self.buffer.iter().position(|&b| b == b'\n')?;
            let raw: Vec<u8> = self.buffer.drain(..=term_pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1])
                .trim_end_matches('\r')
                .to_string();
            if !line.trim().is_empty() {
                return Some((line, raw));
            }
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Device-side codec: bytes in, [`Request`]s out
#[derive(Debug, Default)]
pub struct RequestCodec {
    lines: LineBuffer,
}

impl RequestCodec {
    /// Create a new request codec
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProtocolCodec for RequestCodec {
    type Message = Request;

    fn push_bytes(&mut self, data: &[u8]) {
        self.lines.push_bytes(data);
    }

    fn next_message_with_bytes(&mut self) -> Option<(Request, Vec<u8>)> {
        let (line, raw) = self.lines.next_line()?;
        let request = match Request::parse(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Failed to parse request {:?}: {}", line, e);
                Request::Unknown(line)
            }
        };
        Some((request, raw))
    }

    fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Shell-side codec: bytes in, [`Response`]s out
///
/// Lines that are not valid responses are logged and dropped.
#[derive(Debug, Default)]
pub struct ResponseCodec {
    lines: LineBuffer,
}

impl ResponseCodec {
    /// Create a new response codec
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProtocolCodec for ResponseCodec {
    type Message = Response;

    fn push_bytes(&mut self, data: &[u8]) {
        self.lines.push_bytes(data);
    }

    fn next_message_with_bytes(&mut self) -> Option<(Response, Vec<u8>)> {
        while let Some((line, raw)) = self.lines.next_line() {
            match Response::parse(&line) {
                Ok(response) => return Some((response, raw)),
                Err(e) => warn!("Dropping unparseable response {:?}: {}", line, e),
            }
        }
        None
    }

    fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Status;

    #[test]
    fn test_streaming_parse() {
        let mut codec = RequestCodec::new();
        codec.push_bytes(b"rr 6");
        assert!(codec.next_message().is_none());

        codec.push_bytes(b" 2\r\nex\n");
        assert_eq!(
            codec.next_message(),
            Some(Request::ReadRegister { offset: 6, size: 2 })
        );
        assert_eq!(codec.next_message(), Some(Request::Execute));
        assert!(codec.next_message().is_none());
    }

    #[test]
    fn test_unknown_request_is_kept() {
        let mut codec = RequestCodec::new();
        codec.push_bytes(b"\n\nfoo bar\n");
        let (request, raw) = codec.next_message_with_bytes().unwrap();
        assert_eq!(request, Request::Unknown("foo bar".into()));
        assert_eq!(raw, b"foo bar\n");
    }

    #[test]
    fn test_response_codec_skips_garbage() {
        let mut codec = ResponseCodec::new();
        codec.push_bytes(b"garbage\n{\"result\":\"out_of_range\"}\n");
        let response = codec.next_message().unwrap();
        assert_eq!(response.result, Status::OutOfRange);
        assert!(codec.next_message().is_none());
    }

    #[test]
    fn test_buffer_is_bounded() {
        let mut codec = RequestCodec::new();
        codec.push_bytes(&vec![b'a'; MAX_LINE_LEN * 5]);
        assert!(codec.lines.buffer.len() <= MAX_LINE_LEN);

        codec.clear();
        codec.push_bytes(b"-v\n");
        assert_eq!(codec.next_message(), Some(Request::Version));
    }

    mod proptest_tests {
        use super::*;
        use crate::EncodeMessage;
        use proptest::prelude::*;

        fn request() -> impl Strategy<Value = Request> {
            prop_oneof![
                (0u32..64, 1u32..16).prop_map(|(offset, size)| Request::ReadRegister { offset, size }),
                (0u32..64, prop::collection::vec(any::<u8>(), 1..8))
                    .prop_map(|(offset, data)| Request::WriteRegister { offset, data }),
                Just(Request::Execute),
                Just(Request::ResetMcu),
                Just(Request::Version),
                proptest::option::of(any::<i64>()).prop_map(|value| Request::Special { value }),
            ]
        }

        proptest! {
            #[test]
            fn framing_ignores_chunk_boundaries(
                requests in prop::collection::vec(request(), 1..10),
                chunk in 1usize..7,
            ) {
                let stream: Vec<u8> = requests.iter().flat_map(|r| r.encode()).collect();
                let mut codec = RequestCodec::new();
                let mut decoded = Vec::new();
                for piece in stream.chunks(chunk) {
                    codec.push_bytes(piece);
                    while let Some(request) = codec.next_message() {
                        decoded.push(request);
                    }
                }
                prop_assert_eq!(decoded, requests);
            }
        }
    }
}
