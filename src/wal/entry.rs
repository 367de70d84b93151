use super::LogError;
use std::convert::TryInto;
use std::mem::size_of;

const TAG_INT: u8 = 0;
const TAG_STRING: u8 = 1;

/// One primitive field of a log record. A record is an
/// ordered tuple of fields, encoded as
///
/// ```text
/// | tag: u8 | value | tag: u8 | value | ...
/// ```
///
/// where an int value is 4 little-endian bytes and a string
/// value is a u32 length followed by its utf-8 bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogField {
    Int(i32),
    Str(String),
}

impl From<i32> for LogField {
    fn from(value: i32) -> Self {
        LogField::Int(value)
    }
}

impl From<&str> for LogField {
    fn from(value: &str) -> Self {
        LogField::Str(value.to_string())
    }
}

impl From<String> for LogField {
    fn from(value: String) -> Self {
        LogField::Str(value)
    }
}

impl LogField {
    pub fn encode_all(fields: &[LogField]) -> Vec<u8> {
        let mut bytes = vec![];
        for field in fields {
            match field {
                LogField::Int(value) => {
                    bytes.push(TAG_INT);
                    bytes.extend_from_slice(&value.to_le_bytes());
                }
                LogField::Str(value) => {
                    bytes.push(TAG_STRING);
                    bytes.extend_from_slice(&(value.len() as u32).to_le_bytes());
                    bytes.extend_from_slice(value.as_bytes());
                }
            }
        }
        bytes
    }
}

/// `LogEntry` is a raw record read back from the log, its
/// fields are consumed in the same order they were written.
pub struct LogEntry {
    bytes: Vec<u8>,
    position: usize,
}

impl LogEntry {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, position: 0 }
    }
    pub fn from_fields(fields: &[LogField]) -> Self {
        Self::new(LogField::encode_all(fields))
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
    /// byte offset of the next field to read
    pub fn position(&self) -> usize {
        self.position
    }
    pub fn is_exhausted(&self) -> bool {
        self.position >= self.bytes.len()
    }

    fn take(&mut self, len: usize, expected: &'static str) -> Result<&[u8], LogError> {
        let corrupt = LogError::CorruptEntry {
            position: self.position,
            expected,
        };
        match self.position.checked_add(len) {
            Some(end) if end <= self.bytes.len() => {
                let start = self.position;
                self.position = end;
                Ok(&self.bytes[start..end])
            }
            _ => Err(corrupt),
        }
    }

    fn expect_tag(&mut self, tag: u8, expected: &'static str) -> Result<(), LogError> {
        let position = self.position;
        match self.take(1, expected)? {
            [found] if *found == tag => Ok(()),
            _ => Err(LogError::CorruptEntry { position, expected }),
        }
    }

    pub fn next_int(&mut self) -> Result<i32, LogError> {
        self.expect_tag(TAG_INT, "int")?;
        let bytes = self.take(size_of::<i32>(), "int")?;
        Ok(i32::from_le_bytes(
            bytes.try_into().expect("slice has the size of i32"),
        ))
    }

    pub fn next_string(&mut self) -> Result<String, LogError> {
        self.expect_tag(TAG_STRING, "string")?;
        let len = self.take(size_of::<u32>(), "string length")?;
        let len = u32::from_le_bytes(len.try_into().expect("slice has the size of u32")) as usize;
        let position = self.position;
        let bytes = self.take(len, "string")?;
        String::from_utf8(bytes.to_vec()).map_err(|_| LogError::CorruptEntry {
            position,
            expected: "utf-8 string",
        })
    }
}
