//! Raw slot view
//!
//! Borrowed, zero-copy access to a slot buffer as read from disk.

use bytes::Bytes;

use crate::error::{Result, SlotError};

use super::{
    CRC_OFFSET, FLAG_OFFSET, KEY_CAPACITY, MIN_SLOT_SIZE, VALUE_CAPACITY, VALUE_OFFSET,
    VAL_LEN_OFFSET,
};

/// A slot buffer straight off the disk, decoded on demand
#[derive(Debug, Clone, Copy)]
pub struct RawSlot<'a> {
    buf: &'a [u8],
    offset: u64,
}

impl<'a> RawSlot<'a> {
    /// Wrap a slot buffer read from `offset`
    pub fn new(buf: &'a [u8], offset: u64) -> Result<Self> {
        if buf.len() < MIN_SLOT_SIZE {
            return Err(SlotError::ShortRead { offset });
        }
        Ok(Self { buf, offset })
    }

    /// Byte offset of this slot in the store file
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Key bytes up to the first NUL (or the whole field if none)
    pub fn key_bytes(&self) -> &'a [u8] {
        let field = &self.buf[..KEY_CAPACITY];
        let end = field.iter().position(|&b| b == 0).unwrap_or(KEY_CAPACITY);
        &field[..end]
    }

    /// Key as text, with invalid UTF-8 replaced
    pub fn key(&self) -> String {
        String::from_utf8_lossy(self.key_bytes()).into_owned()
    }

    pub fn key_matches(&self, key: &str) -> bool {
        self.key_bytes() == key.as_bytes()
    }

    pub fn flag(&self) -> u32 {
        read_u32(self.buf, FLAG_OFFSET)
    }

    pub fn stored_crc(&self) -> u32 {
        read_u32(self.buf, CRC_OFFSET)
    }

    /// Stored value length, rejected if it overruns the value field
    pub fn value_len(&self) -> Result<usize> {
        let len = read_u32(self.buf, VAL_LEN_OFFSET) as usize;
        if len > VALUE_CAPACITY {
            return Err(SlotError::Corrupt {
                offset: self.offset,
                reason: format!("value length {} exceeds {}", len, VALUE_CAPACITY),
            });
        }
        Ok(len)
    }

    pub fn value(&self) -> Result<&'a [u8]> {
        let len = self.value_len()?;
        Ok(&self.buf[VALUE_OFFSET..VALUE_OFFSET + len])
    }

    /// Recompute the value CRC and compare it with the stored one
    pub fn verify(&self) -> Result<()> {
        let computed = crc32fast::hash(self.value()?);
        let stored = self.stored_crc();
        if computed != stored {
            return Err(SlotError::ChecksumMismatch {
                key: self.key(),
                offset: self.offset,
                stored,
                computed,
            });
        }
        Ok(())
    }

    /// Copy the value out, optionally verifying its checksum first
    pub fn to_value(&self, verify: bool) -> Result<Bytes> {
        if verify {
            self.verify()?;
        }
        Ok(Bytes::copy_from_slice(self.value()?))
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(word)
}
