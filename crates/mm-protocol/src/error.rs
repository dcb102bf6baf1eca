//! Error types for memory map handling and wire parsing

use thiserror::Error;

/// Errors that can occur while parsing protocol lines
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Line was empty after trimming
    #[error("empty line")]
    Empty,

    /// Unknown request keyword
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Wrong number of arguments for a request
    #[error("{command} expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        command: String,
        expected: String,
        actual: usize,
    },

    /// Argument is not a valid number
    #[error("invalid number: {0}")]
    InvalidNumber(String),

    /// Response line is not valid JSON for a response
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors that can occur while loading or using a memory map
#[derive(Debug, Error)]
pub enum MapError {
    /// Failed to read the memory map file
    #[error("failed to read memory map {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Memory map file is not valid JSON
    #[error("invalid memory map JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Two records share a name
    #[error("duplicate record name: {0}")]
    DuplicateName(String),

    /// Two records occupy overlapping bytes
    #[error("record {first} overlaps record {second}")]
    Overlap { first: String, second: String },

    /// Record declares an empty array
    #[error("record {0} has array_size 0")]
    EmptyArray(String),

    /// Record does not exist
    #[error("unknown record: {0}")]
    UnknownRecord(String),

    /// Wrong number of elements for a record
    #[error("record {name} holds {expected} element(s), got {actual}")]
    ElementCount {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Value does not fit the record type
    #[error("value {value} out of range for {name} ({ty})")]
    ValueOutOfRange {
        name: String,
        ty: &'static str,
        value: i64,
    },

    /// Record is too large to read or write in one protocol line
    #[error("record {name} is {size} bytes; records are limited to {limit}")]
    RecordTooLarge { name: String, size: u64, limit: usize },

    /// Record ends past the largest supported register file
    #[error("record {name} ends at byte {end}; maps are limited to {limit} bytes")]
    MapTooLarge { name: String, end: u64, limit: usize },

    /// Byte buffer size does not match the record
    #[error("record {name} needs {expected} bytes, got {actual}")]
    ByteCount {
        name: String,
        expected: usize,
        actual: usize,
    },
}
