//! Slot Module
//!
//! A slot is one fixed-size record in the store file, holding a single
//! key/value pair plus its metadata.
//!
//! ## Slot Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Key (128)                                               │
//! │   NUL-terminated UTF-8, zero padded                     │
//! ├─────────────────────────────────────────────────────────┤
//! │ Value (256)                                             │
//! │   raw bytes, zero padded beyond ValLen                  │
//! ├─────────────────────────────────────────────────────────┤
//! │ State (12)                                              │
//! │   Flag: u32 (4) | ValLen: u32 (4) | CRC32: u32 (4)      │
//! ├─────────────────────────────────────────────────────────┤
//! │ Reserved (slot_size - 396)                              │
//! │   zeroes                                                │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. The file has no header: it is a plain
//! concatenation of slots, so its length is always a multiple of the slot size.

mod raw;

use bytes::Bytes;

use crate::error::{Result, SlotError};

pub use raw::RawSlot;

// =============================================================================
// Layout Constants
// =============================================================================

/// Bytes reserved for the key, including its NUL terminator
pub const KEY_CAPACITY: usize = 128;

/// Longest key that still leaves room for the terminator
pub const MAX_KEY_LEN: usize = KEY_CAPACITY - 1;

/// Bytes reserved for the value
pub const VALUE_CAPACITY: usize = 256;

/// Flag (4) + ValLen (4) + CRC32 (4)
pub const STATE_SIZE: usize = 12;

/// Smallest slot that can hold a full record
pub const MIN_SLOT_SIZE: usize = KEY_CAPACITY + VALUE_CAPACITY + STATE_SIZE;

/// Reference slot size used by the update agent
pub const DEFAULT_SLOT_SIZE: usize = 512;

pub(crate) const VALUE_OFFSET: usize = KEY_CAPACITY;
pub(crate) const FLAG_OFFSET: usize = VALUE_OFFSET + VALUE_CAPACITY;
pub(crate) const VAL_LEN_OFFSET: usize = FLAG_OFFSET + 4;
pub(crate) const CRC_OFFSET: usize = VAL_LEN_OFFSET + 4;

// =============================================================================
// Slot
// =============================================================================

/// An owned, validated key/value record ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    key: String,
    value: Bytes,
    flag: u32,
}

impl Slot {
    /// Build a slot, rejecting keys and values that do not fit the layout
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>) -> Result<Self> {
        let key = key.into();
        let value = value.into();
        validate_key(&key)?;
        validate_value(&value)?;
        Ok(Self {
            key,
            value,
            flag: 0,
        })
    }

    /// Carry over the reserved flag word (kept as-is on update)
    pub fn with_flag(mut self, flag: u32) -> Self {
        self.flag = flag;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn flag(&self) -> u32 {
        self.flag
    }

    /// CRC-32 (IEEE) of the value bytes
    pub fn checksum(&self) -> u32 {
        crc32fast::hash(&self.value)
    }

    /// Serialize into exactly `slot_size` bytes
    ///
    /// Every byte not covered by the key, value or state is zero, so a
    /// shorter value never leaks the tail of a previous longer one.
    pub fn encode(&self, slot_size: usize) -> Result<Vec<u8>> {
        check_slot_size(slot_size)?;

        let mut buf = vec![0u8; slot_size];
        let key = self.key.as_bytes();
        buf[..key.len()].copy_from_slice(key);
        buf[VALUE_OFFSET..VALUE_OFFSET + self.value.len()].copy_from_slice(&self.value);
        buf[FLAG_OFFSET..VAL_LEN_OFFSET].copy_from_slice(&self.flag.to_le_bytes());
        buf[VAL_LEN_OFFSET..CRC_OFFSET].copy_from_slice(&(self.value.len() as u32).to_le_bytes());
        buf[CRC_OFFSET..MIN_SLOT_SIZE].copy_from_slice(&self.checksum().to_le_bytes());
        Ok(buf)
    }
}

// =============================================================================
// Argument Validation
// =============================================================================

/// A key must be non-empty, NUL-free and short enough to keep its terminator
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(SlotError::InvalidArgument("key is empty".to_string()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(SlotError::InvalidArgument(format!(
            "key is {} bytes, limit is {}",
            key.len(),
            MAX_KEY_LEN
        )));
    }
    if key.as_bytes().contains(&0) {
        return Err(SlotError::InvalidArgument(
            "key contains a NUL byte".to_string(),
        ));
    }
    Ok(())
}

/// A slot must hold at least the key, value and state fields
pub fn check_slot_size(slot_size: usize) -> Result<()> {
    if slot_size < MIN_SLOT_SIZE {
        return Err(SlotError::Config(format!(
            "slot_size {} is below the minimum of {} bytes",
            slot_size, MIN_SLOT_SIZE
        )));
    }
    Ok(())
}

pub fn validate_value(value: &[u8]) -> Result<()> {
    if value.len() > VALUE_CAPACITY {
        return Err(SlotError::InvalidArgument(format!(
            "value is {} bytes, limit is {}",
            value.len(),
            VALUE_CAPACITY
        )));
    }
    Ok(())
}
