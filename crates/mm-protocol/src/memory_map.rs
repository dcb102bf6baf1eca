//! Memory map model
//!
//! A memory map is an ordered list of named records. Each record occupies
//! `type size * array_size` bytes starting at its offset in the device
//! register file. Values are little endian.

use std::collections::HashSet;
use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::MAX_LINE_LEN;
use crate::error::MapError;

/// Characters around the data bytes in the longest `rr` response or `wr` request
const LINE_OVERHEAD: usize = 64;

/// Largest record, in bytes, that can be read or written in one line
///
/// Each data byte travels as a decimal number of up to three digits plus a
/// separator.
pub const MAX_RECORD_SIZE: usize = (MAX_LINE_LEN - LINE_OVERHEAD) / 4;

/// Largest register file a map may describe
pub const MAX_MAP_SIZE: usize = 1 << 20;

/// Element type of a record, named after the C types used in map files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterType {
    #[serde(rename = "uint8_t")]
    U8,
    #[serde(rename = "int8_t")]
    I8,
    #[serde(rename = "uint16_t")]
    U16,
    #[serde(rename = "int16_t")]
    I16,
    #[serde(rename = "uint32_t")]
    U32,
    #[serde(rename = "int32_t")]
    I32,
    #[serde(rename = "uint64_t")]
    U64,
    #[serde(rename = "int64_t")]
    I64,
}

impl RegisterType {
    /// Size of one element in bytes
    pub fn size(self) -> usize {
        match self {
            RegisterType::U8 | RegisterType::I8 => 1,
            RegisterType::U16 | RegisterType::I16 => 2,
            RegisterType::U32 | RegisterType::I32 => 4,
            RegisterType::U64 | RegisterType::I64 => 8,
        }
    }

    /// C type name as it appears in map files
    pub fn name(self) -> &'static str {
        match self {
            RegisterType::U8 => "uint8_t",
            RegisterType::I8 => "int8_t",
            RegisterType::U16 => "uint16_t",
            RegisterType::I16 => "int16_t",
            RegisterType::U32 => "uint32_t",
            RegisterType::I32 => "int32_t",
            RegisterType::U64 => "uint64_t",
            RegisterType::I64 => "int64_t",
        }
    }

    /// Inclusive value range representable by this type
    ///
    /// `uint64_t` is limited to `i64::MAX` since values travel as `i64`.
    pub fn range(self) -> (i64, i64) {
        match self {
            RegisterType::U8 => (0, u8::MAX as i64),
            RegisterType::I8 => (i8::MIN as i64, i8::MAX as i64),
            RegisterType::U16 => (0, u16::MAX as i64),
            RegisterType::I16 => (i16::MIN as i64, i16::MAX as i64),
            RegisterType::U32 => (0, u32::MAX as i64),
            RegisterType::I32 => (i32::MIN as i64, i32::MAX as i64),
            RegisterType::U64 => (0, i64::MAX),
            RegisterType::I64 => (i64::MIN, i64::MAX),
        }
    }

    fn contains(self, value: i64) -> bool {
        let (min, max) = self.range();
        (min..=max).contains(&value)
    }

    /// Decode one element from exactly `self.size()` bytes
    fn decode_element(self, bytes: &[u8]) -> i64 {
        match self {
            RegisterType::U8 => bytes[0] as i64,
            RegisterType::I8 => bytes[0] as i8 as i64,
            RegisterType::U16 => u16::from_le_bytes(le(bytes)) as i64,
            RegisterType::I16 => i16::from_le_bytes(le(bytes)) as i64,
            RegisterType::U32 => u32::from_le_bytes(le(bytes)) as i64,
            RegisterType::I32 => i32::from_le_bytes(le(bytes)) as i64,
            RegisterType::U64 => u64::from_le_bytes(le(bytes)) as i64,
            RegisterType::I64 => i64::from_le_bytes(le(bytes)),
        }
    }
}

fn le<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// Access permission of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    #[serde(alias = "ro")]
    ReadOnly,
    #[default]
    #[serde(alias = "rw")]
    ReadWrite,
}

fn default_array_size() -> u32 {
    1
}

/// One named register (or register array) in the memory map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Record name, e.g. `user.counter`
    pub name: String,
    /// Byte offset in the register file
    pub offset: u32,
    /// Element type
    #[serde(rename = "type")]
    pub ty: RegisterType,
    /// Number of elements
    #[serde(default = "default_array_size")]
    pub array_size: u32,
    /// Access permission
    #[serde(default)]
    pub access: Access,
    /// Default value applied to every element after reset
    #[serde(default)]
    pub default: Option<i64>,
    /// Free text description
    #[serde(default)]
    pub description: String,
}

impl Record {
    /// Total size of the record in bytes
    pub fn size(&self) -> usize {
        self.ty.size() * self.array_size as usize
    }

    /// Byte range occupied in the register file
    pub fn span(&self) -> Range<usize> {
        let start = self.offset as usize;
        start..start + self.size()
    }

    /// Whether the record may be written
    pub fn is_writable(&self) -> bool {
        self.access == Access::ReadWrite
    }

    /// Encode element values to little endian bytes
    pub fn encode(&self, values: &[i64]) -> Result<Vec<u8>, MapError> {
        if values.len() != self.array_size as usize {
            return Err(MapError::ElementCount {
                name: self.name.clone(),
                expected: self.array_size as usize,
                actual: values.len(),
            });
        }

        let mut out = Vec::with_capacity(self.size());
        for &value in values {
            if !self.ty.contains(value) {
                return Err(MapError::ValueOutOfRange {
                    name: self.name.clone(),
                    ty: self.ty.name(),
                    value,
                });
            }
            out.extend_from_slice(&value.to_le_bytes()[..self.ty.size()]);
        }
        Ok(out)
    }

    /// Decode little endian bytes to element values
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<i64>, MapError> {
        if bytes.len() != self.size() {
            return Err(MapError::ByteCount {
                name: self.name.clone(),
                expected: self.size(),
                actual: bytes.len(),
            });
        }

        Ok(bytes
            .chunks_exact(self.ty.size())
            .map(|chunk| self.ty.decode_element(chunk))
            .collect())
    }

    /// Bytes of the record after a reset
    pub fn default_bytes(&self) -> Result<Vec<u8>, MapError> {
        let value = self.default.unwrap_or(0);
        self.encode(&vec![value; self.array_size as usize])
    }
}

/// Reject records that cannot travel in one protocol line or that would
/// make the register file unreasonably large
///
/// Runs before anything is allocated for the record.
fn check_extent(record: &Record) -> Result<(), MapError> {
    let size = record.ty.size() as u64 * u64::from(record.array_size);
    if size > MAX_RECORD_SIZE as u64 {
        return Err(MapError::RecordTooLarge {
            name: record.name.clone(),
            size,
            limit: MAX_RECORD_SIZE,
        });
    }

    let end = u64::from(record.offset) + size;
    if end > MAX_MAP_SIZE as u64 {
        return Err(MapError::MapTooLarge {
            name: record.name.clone(),
            end,
            limit: MAX_MAP_SIZE,
        });
    }
    Ok(())
}

/// On-disk shape of a memory map file
#[derive(Deserialize)]
#[serde(untagged)]
enum MapFile {
    List(Vec<Record>),
    Object { records: Vec<Record> },
}

/// Validated memory map
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryMap {
    records: Vec<Record>,
}

impl MemoryMap {
    /// Build a map from records, checking names, sizes, overlaps and defaults
    pub fn from_records(records: Vec<Record>) -> Result<Self, MapError> {
        let mut names = HashSet::new();
        for record in &records {
            if !names.insert(record.name.as_str()) {
                return Err(MapError::DuplicateName(record.name.clone()));
            }
            if record.array_size == 0 {
                return Err(MapError::EmptyArray(record.name.clone()));
            }
            check_extent(record)?;
            record.default_bytes()?;
        }

        let mut by_offset: Vec<&Record> = records.iter().collect();
        by_offset.sort_by_key(|r| r.offset);
        for pair in by_offset.windows(2) {
            if pair[0].span().end > pair[1].span().start {
                return Err(MapError::Overlap {
                    first: pair[0].name.clone(),
                    second: pair[1].name.clone(),
                });
            }
        }

        Ok(Self { records })
    }

    /// Parse a memory map from JSON (array of records or `{"records": [...]}`)
    pub fn from_json_str(json: &str) -> Result<Self, MapError> {
        let records = match serde_json::from_str::<MapFile>(json)? {
            MapFile::List(records) => records,
            MapFile::Object { records } => records,
        };
        Self::from_records(records)
    }

    /// Load a memory map from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MapError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| MapError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let map = Self::from_json_str(&json)?;
        debug!(
            "Loaded memory map {} ({} records, {} bytes)",
            path.display(),
            map.records.len(),
            map.size()
        );
        Ok(map)
    }

    /// Built-in map used by the mock device when no map file is given
    pub fn mock() -> Self {
        let record = |name: &str, offset, ty, array_size, access, default, description: &str| Record {
            name: name.to_string(),
            offset,
            ty,
            array_size,
            access,
            default,
            description: description.to_string(),
        };

        Self {
            records: vec![
                record(
                    "sys.serial_number",
                    0,
                    RegisterType::U32,
                    1,
                    Access::ReadOnly,
                    Some(0x4D4F_434B),
                    "Device serial number",
                ),
                record(
                    "sys.sw_rev",
                    4,
                    RegisterType::U8,
                    1,
                    Access::ReadOnly,
                    Some(1),
                    "Firmware revision",
                ),
                record(
                    "sys.status",
                    5,
                    RegisterType::U8,
                    1,
                    Access::ReadOnly,
                    Some(0),
                    "Status flags",
                ),
                record(
                    "user.counter",
                    6,
                    RegisterType::U16,
                    1,
                    Access::ReadWrite,
                    Some(0),
                    "General purpose counter",
                ),
                record(
                    "user.setpoint",
                    8,
                    RegisterType::I32,
                    1,
                    Access::ReadWrite,
                    Some(0),
                    "Signed setpoint",
                ),
                record(
                    "user.buffer",
                    12,
                    RegisterType::U8,
                    8,
                    Access::ReadWrite,
                    Some(0),
                    "Scratch buffer",
                ),
            ],
        }
    }

    /// All records in declaration order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Look up a record by name
    pub fn record(&self, name: &str) -> Result<&Record, MapError> {
        self.records
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| MapError::UnknownRecord(name.to_string()))
    }

    /// Records touching any byte of `span`
    pub fn records_in(&self, span: Range<usize>) -> impl Iterator<Item = &Record> {
        self.records
            .iter()
            .filter(move |r| r.span().start < span.end && span.start < r.span().end)
    }

    /// Size of the register file in bytes
    pub fn size(&self) -> usize {
        self.records.iter().map(|r| r.span().end).max().unwrap_or(0)
    }

    /// Register file image with every record at its default
    pub fn default_image(&self) -> Vec<u8> {
        let mut image = vec![0u8; self.size()];
        for record in &self.records {
            // Defaults were range checked in from_records
            if let Ok(bytes) = record.default_bytes() {
                image[record.span()].copy_from_slice(&bytes);
            }
        }
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_map_is_valid() {
        let mock = MemoryMap::mock();
        let checked = MemoryMap::from_records(mock.records().to_vec()).unwrap();
        assert_eq!(checked, mock);
        assert_eq!(mock.size(), 20);
    }

    #[test]
    fn test_parse_list_and_object_forms() {
        let list = r#"[{"name": "a", "offset": 0, "type": "uint16_t"}]"#;
        let object = r#"{"records": [{"name": "a", "offset": 0, "type": "uint16_t"}]}"#;

        let a = MemoryMap::from_json_str(list).unwrap();
        let b = MemoryMap::from_json_str(object).unwrap();
        assert_eq!(a, b);

        let record = a.record("a").unwrap();
        assert_eq!(record.array_size, 1);
        assert_eq!(record.access, Access::ReadWrite);
        assert_eq!(record.size(), 2);
    }

    #[test]
    fn test_access_aliases() {
        let json = r#"[{"name": "a", "offset": 0, "type": "uint8_t", "access": "ro"},
                       {"name": "b", "offset": 1, "type": "uint8_t", "access": "read_write"}]"#;
        let map = MemoryMap::from_json_str(json).unwrap();
        assert!(!map.record("a").unwrap().is_writable());
        assert!(map.record("b").unwrap().is_writable());
    }

    #[test]
    fn test_rejects_overlap() {
        let json = r#"[{"name": "a", "offset": 0, "type": "uint32_t"},
                       {"name": "b", "offset": 2, "type": "uint8_t"}]"#;
        let err = MemoryMap::from_json_str(json).unwrap_err();
        assert!(matches!(err, MapError::Overlap { .. }));
    }

    #[test]
    fn test_rejects_duplicate_and_empty() {
        let dup = r#"[{"name": "a", "offset": 0, "type": "uint8_t"},
                      {"name": "a", "offset": 1, "type": "uint8_t"}]"#;
        assert!(matches!(
            MemoryMap::from_json_str(dup).unwrap_err(),
            MapError::DuplicateName(_)
        ));

        let empty = r#"[{"name": "a", "offset": 0, "type": "uint8_t", "array_size": 0}]"#;
        assert!(matches!(
            MemoryMap::from_json_str(empty).unwrap_err(),
            MapError::EmptyArray(_)
        ));
    }

    #[test]
    fn test_rejects_records_too_large_for_a_line() {
        let json = r#"[{"name": "big", "offset": 0, "type": "uint8_t", "array_size": 5000, "default": 255}]"#;
        let err = MemoryMap::from_json_str(json).unwrap_err();
        assert!(matches!(
            err,
            MapError::RecordTooLarge { size: 5000, limit: MAX_RECORD_SIZE, .. }
        ));
        assert!(err.to_string().contains("big"));

        // Limit is in bytes, not elements
        let wide = format!(
            r#"[{{"name": "wide", "offset": 0, "type": "uint64_t", "array_size": {}}}]"#,
            MAX_RECORD_SIZE / 8 + 1
        );
        assert!(matches!(
            MemoryMap::from_json_str(&wide).unwrap_err(),
            MapError::RecordTooLarge { .. }
        ));

        // Rejected before the default image is built
        let huge = r#"[{"name": "huge", "offset": 0, "type": "int64_t", "array_size": 4294967295}]"#;
        assert!(matches!(
            MemoryMap::from_json_str(huge).unwrap_err(),
            MapError::RecordTooLarge { .. }
        ));
    }

    #[test]
    fn test_largest_record_and_map_limits() {
        let largest = format!(
            r#"[{{"name": "big", "offset": 0, "type": "uint8_t", "array_size": {}, "default": 255}}]"#,
            MAX_RECORD_SIZE
        );
        let map = MemoryMap::from_json_str(&largest).unwrap();
        assert_eq!(map.size(), MAX_RECORD_SIZE);
        assert!(map.default_image().iter().all(|&b| b == 255));

        let far = r#"[{"name": "far", "offset": 4294967295, "type": "uint8_t"}]"#;
        assert!(matches!(
            MemoryMap::from_json_str(far).unwrap_err(),
            MapError::MapTooLarge { end: 4294967296, .. }
        ));

        let last = format!(
            r#"[{{"name": "last", "offset": {}, "type": "uint32_t"}}]"#,
            MAX_MAP_SIZE - 4
        );
        assert_eq!(MemoryMap::from_json_str(&last).unwrap().size(), MAX_MAP_SIZE);
    }

    #[test]
    fn test_rejects_bad_default() {
        let json = r#"[{"name": "a", "offset": 0, "type": "uint8_t", "default": 300}]"#;
        assert!(matches!(
            MemoryMap::from_json_str(json).unwrap_err(),
            MapError::ValueOutOfRange { .. }
        ));
    }

    #[test]
    fn test_encode_decode_signed() {
        let map = MemoryMap::mock();
        let setpoint = map.record("user.setpoint").unwrap();

        let bytes = setpoint.encode(&[-2]).unwrap();
        assert_eq!(bytes, vec![0xFE, 0xFF, 0xFF, 0xFF]);
        assert_eq!(setpoint.decode(&bytes).unwrap(), vec![-2]);
    }

    #[test]
    fn test_encode_checks_count_and_range() {
        let map = MemoryMap::mock();
        let counter = map.record("user.counter").unwrap();

        assert!(matches!(
            counter.encode(&[1, 2]).unwrap_err(),
            MapError::ElementCount { expected: 1, actual: 2, .. }
        ));
        assert!(matches!(
            counter.encode(&[70_000]).unwrap_err(),
            MapError::ValueOutOfRange { value: 70_000, .. }
        ));
        assert!(counter.encode(&[-1]).is_err());
    }

    #[test]
    fn test_default_image() {
        let map = MemoryMap::mock();
        let image = map.default_image();
        assert_eq!(&image[0..4], &0x4D4F_434Bu32.to_le_bytes());
        assert_eq!(image[4], 1);
        assert!(image[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_records_in_span() {
        let map = MemoryMap::mock();
        let names: Vec<_> = map.records_in(3..7).map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["sys.serial_number", "sys.sw_rev", "sys.status", "user.counter"]
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        std::fs::write(&path, r#"[{"name": "x", "offset": 4, "type": "int16_t"}]"#).unwrap();

        let map = MemoryMap::load(&path).unwrap();
        assert_eq!(map.size(), 6);

        let missing = MemoryMap::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, MapError::Io { .. }));
    }
}
