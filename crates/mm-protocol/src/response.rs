//! Responses sent from the device to the shell
//!
//! Each response is one JSON object on one line, for example
//! `{"result":"success","data":[1,0]}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParseError;
use crate::EncodeMessage;

/// Outcome of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    InvalidCommand,
    InvalidArgs,
    OutOfRange,
    ReadOnly,
}

impl Status {
    /// Human-readable description
    pub fn describe(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::InvalidCommand => "invalid command",
            Status::InvalidArgs => "invalid arguments",
            Status::OutOfRange => "address out of range",
            Status::ReadOnly => "register is read-only",
        }
    }
}

/// A device response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Request outcome
    pub result: Status,
    /// Payload, if the request produces one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Extra detail for failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl Response {
    /// Successful response without payload
    pub fn success() -> Self {
        Self {
            result: Status::Success,
            data: None,
            msg: None,
        }
    }

    /// Successful response with payload
    pub fn with_data(data: impl Into<Value>) -> Self {
        Self {
            result: Status::Success,
            data: Some(data.into()),
            msg: None,
        }
    }

    /// Failed response
    pub fn error(result: Status, msg: impl Into<String>) -> Self {
        Self {
            result,
            data: None,
            msg: Some(msg.into()),
        }
    }

    /// Whether the request succeeded
    pub fn is_success(&self) -> bool {
        self.result == Status::Success
    }

    /// Parse a response line (without terminator)
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        serde_json::from_str(line.trim()).map_err(|e| ParseError::InvalidResponse(e.to_string()))
    }

    /// Payload as a byte array
    pub fn data_bytes(&self) -> Option<Vec<u8>> {
        self.data
            .as_ref()?
            .as_array()?
            .iter()
            .map(|v| v.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect()
    }

    /// Payload as an integer
    pub fn data_int(&self) -> Option<i64> {
        self.data.as_ref()?.as_i64()
    }

    /// Payload as a string
    pub fn data_str(&self) -> Option<&str> {
        self.data.as_ref()?.as_str()
    }
}

impl EncodeMessage for Response {
    fn encode(&self) -> Vec<u8> {
        // A struct of enums, strings and JSON values always serializes
        let mut bytes = serde_json::to_vec(self).unwrap_or_default();
        bytes.push(b'\n');
        bytes
    }
}
