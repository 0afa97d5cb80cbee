//! Configuration for slotkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SlotError};
use crate::slot::{check_slot_size, DEFAULT_SLOT_SIZE};

/// Main configuration for a slot store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// The store file. Created on first use.
    pub path: PathBuf,

    /// Total bytes per slot (key + value + state + padding)
    pub slot_size: usize,

    /// How hard to push writes towards the disk
    pub sync_strategy: SyncStrategy,

    /// Reject slots whose stored CRC does not match their value on `get`
    pub verify_checksums: bool,

    // -------------------------------------------------------------------------
    // Locking Configuration
    // -------------------------------------------------------------------------
    /// `None` blocks until the lock is free. `Some` bounds the wait.
    pub lock_timeout: Option<Duration>,
}

/// Write sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// Flush userspace buffers on every write, leave fsync to the OS
    Flush,

    /// fsync after every write (safest, slowest)
    Always,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./uota.kv"),
            slot_size: DEFAULT_SLOT_SIZE,
            sync_strategy: SyncStrategy::Flush,
            verify_checksums: true,
            lock_timeout: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the slot geometry can hold a full record
    pub fn validate(&self) -> Result<()> {
        check_slot_size(self.slot_size)?;
        if self.path.as_os_str().is_empty() {
            return Err(SlotError::Config("store path is empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the store file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the slot size (in bytes)
    pub fn slot_size(mut self, size: usize) -> Self {
        self.config.slot_size = size;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Enable or disable CRC checks on read
    pub fn verify_checksums(mut self, enabled: bool) -> Self {
        self.config.verify_checksums = enabled;
        self
    }

    /// Bound the time an operation waits for the store lock
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
