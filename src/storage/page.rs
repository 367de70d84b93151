use super::{StorageError, PAGE_SIZE};
use std::convert::TryInto;
use std::mem::size_of;

///
/// Page holds the raw content of exactly one block.
///
/// Integers are stored as 4 little-endian bytes, strings as
///
/// ```text
/// | len: u32 | utf-8 bytes |
/// ```
///
#[derive(Clone)]
pub struct Page {
    pub buffer: Box<[u8; PAGE_SIZE]>,
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Page {
    pub fn new() -> Self {
        Page {
            buffer: Box::new([0; PAGE_SIZE]),
        }
    }
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut page = Self::new();
        let len = bytes.len().min(PAGE_SIZE);
        page.buffer[..len].copy_from_slice(&bytes[..len]);
        page
    }
    pub fn as_raw(&self) -> &[u8; PAGE_SIZE] {
        &self.buffer
    }
    pub fn as_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.buffer
    }
    /// zero the whole page
    pub fn clear(&mut self) {
        self.buffer.iter_mut().for_each(|b| *b = 0);
    }

    fn range(offset: usize, len: usize) -> Result<std::ops::Range<usize>, StorageError> {
        match offset.checked_add(len) {
            Some(end) if end <= PAGE_SIZE => Ok(offset..end),
            _ => Err(StorageError::PageOverflow { offset, len }),
        }
    }

    pub fn get_int(&self, offset: usize) -> Result<i32, StorageError> {
        let range = Self::range(offset, size_of::<i32>())?;
        Ok(i32::from_le_bytes(
            self.buffer[range].try_into().expect("range has the size of i32"),
        ))
    }
    pub fn set_int(&mut self, offset: usize, value: i32) -> Result<(), StorageError> {
        let range = Self::range(offset, size_of::<i32>())?;
        self.buffer[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
    pub fn get_bytes(&self, offset: usize) -> Result<&[u8], StorageError> {
        let range = Self::range(offset, size_of::<u32>())?;
        let len = u32::from_le_bytes(
            self.buffer[range].try_into().expect("range has the size of u32"),
        ) as usize;
        let range = Self::range(offset + size_of::<u32>(), len)?;
        Ok(&self.buffer[range])
    }
    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StorageError> {
        let range = Self::range(offset, size_of::<u32>() + bytes.len())?;
        let (len, data) = self.buffer[range].split_at_mut(size_of::<u32>());
        len.copy_from_slice(&(bytes.len() as u32).to_le_bytes());
        data.copy_from_slice(bytes);
        Ok(())
    }
    pub fn get_string(&self, offset: usize) -> Result<String, StorageError> {
        let bytes = self.get_bytes(offset)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| StorageError::InvalidUtf8(offset))
    }
    pub fn set_string(&mut self, offset: usize, value: &str) -> Result<(), StorageError> {
        self.set_bytes(offset, value.as_bytes())
    }
    /// bytes taken by a string of `len` bytes, length prefix included
    pub fn max_string_len(len: usize) -> usize {
        size_of::<u32>() + len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_and_string_test() {
        let mut page = Page::new();
        page.set_int(0, -42).unwrap();
        page.set_string(4, "hello").unwrap();
        page.set_int(4 + Page::max_string_len(5), 7).unwrap();
        assert_eq!(page.get_int(0).unwrap(), -42);
        assert_eq!(page.get_string(4).unwrap(), "hello");
        assert_eq!(page.get_int(13).unwrap(), 7);
        // a zeroed page reads as an empty string
        assert_eq!(Page::new().get_string(100).unwrap(), "");
    }

    #[test]
    fn overflow_test() {
        let mut page = Page::new();
        assert!(page.set_int(PAGE_SIZE - 2, 1).is_err());
        assert!(page.set_string(PAGE_SIZE - 4, "x").is_err());
        assert!(page.get_int(usize::MAX).is_err());
        page.set_int(PAGE_SIZE - 4, 1).unwrap();
        // a corrupt length prefix must not panic
        page.set_int(0, i32::MAX).unwrap();
        assert!(page.get_string(0).is_err());
    }
}
