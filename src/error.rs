//! Error types for slotkv
//!
//! Provides a unified error type for all store operations.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using SlotError
pub type Result<T> = std::result::Result<T, SlotError>;

/// Unified error type for slotkv operations
#[derive(Debug, Error)]
pub enum SlotError {
    // -------------------------------------------------------------------------
    // Argument Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Truncate failed: {0}")]
    Truncate(#[source] std::io::Error),

    // -------------------------------------------------------------------------
    // Corruption Errors
    // -------------------------------------------------------------------------
    #[error("Store file length {len} is not a multiple of slot size {slot_size}")]
    Misaligned { len: u64, slot_size: usize },

    #[error("Short read at offset {offset}: slot truncated")]
    ShortRead { offset: u64 },

    #[error("Corrupt slot at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    #[error("Checksum mismatch for key {key:?} at offset {offset}: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        key: String,
        offset: u64,
        stored: u32,
        computed: u32,
    },

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Timed out after {0:?} waiting for store lock")]
    LockTimeout(Duration),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SlotError {
    /// True for errors that indicate a damaged store file
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            SlotError::Misaligned { .. }
                | SlotError::ShortRead { .. }
                | SlotError::Corrupt { .. }
                | SlotError::ChecksumMismatch { .. }
        )
    }
}
