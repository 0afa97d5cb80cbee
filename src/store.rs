//! Store Module
//!
//! The slot store: a persistent key/value map kept as a flat file of
//! fixed-size slots.
//!
//! ## Responsibilities
//! - Serialize every operation behind one store-wide lock
//! - Update the first matching slot in place, or append a new one
//! - Remove slots by swap-remove, committed with an atomic file replace
//! - Verify value checksums on read
//!
//! Every call is a complete open → scan → mutate → flush → close cycle.
//! No state survives between calls except the file itself.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::Path;

use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::{Config, SyncStrategy};
use crate::error::{Result, SlotError};
use crate::file::{replace_atomically, SlotFile};
use crate::namespace::Namespace;
use crate::slot::{validate_key, RawSlot, Slot};

// =============================================================================
// Results
// =============================================================================

/// Outcome of a lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The key is present with this value (possibly empty)
    Found(Bytes),

    /// No slot holds the key
    NotFound,
}

impl Lookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn into_option(self) -> Option<Bytes> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }
}

/// Outcome of a delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The slot was removed and the file shrank by one slot
    Removed,

    /// No slot held the key; the file is untouched
    NotFound,
}

/// Summary of a read-only integrity scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Slots in the file
    pub total_slots: usize,

    /// Slots that decode and pass their checksum
    pub valid_slots: usize,

    /// Slots whose stored CRC does not match their value
    pub checksum_failures: usize,

    /// Slots whose stored length overruns the value field
    pub corrupt_slots: usize,

    /// Keys present in more than one slot (only the first is reachable)
    pub duplicate_keys: Vec<String>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.valid_slots == self.total_slots && self.duplicate_keys.is_empty()
    }
}

// =============================================================================
// SlotStore
// =============================================================================

/// Persistent key/value store over a single slot file
///
/// ## Concurrency Model
///
/// One `parking_lot::Mutex` serializes every operation, reads included.
/// Share the store across threads with `Arc<SlotStore>`. Two stores opened
/// on the same path do not coordinate with each other.
pub struct SlotStore {
    config: Config,
    lock: Mutex<()>,
}

impl SlotStore {
    /// Open a store, creating an empty file if none exists
    ///
    /// The file's alignment is checked on every operation, not here, so a
    /// damaged file can still be opened and then wiped with `erase_all`.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(&config.path)?;
        let len = file.metadata()?.len();
        if len % config.slot_size as u64 != 0 {
            warn!(
                path = %config.path.display(),
                len,
                slot_size = config.slot_size,
                "store file is not slot-aligned; operations will fail until erased"
            );
        }

        info!(
            path = %config.path.display(),
            slot_size = config.slot_size,
            slots = len / config.slot_size as u64,
            "opened slot store"
        );

        Ok(Self {
            config,
            lock: Mutex::new(()),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified store file
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().path(path).build())
    }

    /// Store `value` under `key`, honouring the configured sync strategy
    pub fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.set_with_sync(key, value, false)
    }

    /// Store `value` under `key`; `sync` forces an fsync for this write
    ///
    /// Updates the first slot holding `key` in place, otherwise appends a
    /// new slot at end-of-file.
    pub fn set_with_sync(&self, key: &str, value: &[u8], sync: bool) -> Result<()> {
        let slot = Slot::new(key, Bytes::copy_from_slice(value))?;
        let _guard = self.acquire()?;

        let result = (|| -> Result<()> {
            let mut file = self.open_file()?;
            let existing = file.scan(|index, raw| {
                Ok(raw.key_matches(key).then(|| (index, raw.flag())))
            })?;

            match existing {
                Some((index, flag)) => {
                    let bytes = slot.with_flag(flag).encode(self.config.slot_size)?;
                    file.write_slot(index, &bytes)?;
                    debug!(key, index, len = value.len(), "updated slot in place");
                }
                None => {
                    let index = file.append(&slot.encode(self.config.slot_size)?)?;
                    debug!(key, index, len = value.len(), "appended slot");
                }
            }

            file.flush(sync || self.config.sync_strategy == SyncStrategy::Always)
        })();

        log_failure("set", key, result)
    }

    /// Look up `key`
    ///
    /// Returns:
    /// - `Ok(Lookup::Found(value))` — key present
    /// - `Ok(Lookup::NotFound)` — key absent
    /// - `Err(ChecksumMismatch)` — key present but its value is damaged
    pub fn get(&self, key: &str) -> Result<Lookup> {
        validate_key(key)?;
        let _guard = self.acquire()?;

        let result = (|| -> Result<Option<Bytes>> {
            let mut file = self.open_file()?;
            let verify = self.config.verify_checksums;
            file.scan(|index, raw| {
                if !raw.key_matches(key) {
                    return Ok(None);
                }
                debug!(key, index, "key found");
                raw.to_value(verify).map(Some)
            })
        })();

        match log_failure("get", key, result)? {
            Some(value) => Ok(Lookup::Found(value)),
            None => {
                debug!(key, "key not found");
                Ok(Lookup::NotFound)
            }
        }
    }

    /// True if a slot holds `key` (checksums are not checked)
    pub fn contains(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let _guard = self.acquire()?;

        let result = (|| -> Result<Option<()>> {
            let mut file = self.open_file()?;
            file.scan(|_, raw| Ok(raw.key_matches(key).then_some(())))
        })();

        Ok(log_failure("contains", key, result)?.is_some())
    }

    /// Remove `key` by swap-remove
    ///
    /// The last slot moves into the vacated position and the file shrinks by
    /// one slot. The shrunken contents are committed with a single atomic
    /// rename, so a crash never leaves the moved slot duplicated.
    pub fn delete(&self, key: &str) -> Result<Removal> {
        validate_key(key)?;
        let _guard = self.acquire()?;

        let result = (|| -> Result<Removal> {
            let mut file = self.open_file()?;
            let index = match file.scan(|index, raw| Ok(raw.key_matches(key).then_some(index)))? {
                Some(index) => index,
                None => {
                    debug!(key, "delete: key not found");
                    return Ok(Removal::NotFound);
                }
            };

            let slot_size = self.config.slot_size;
            let last = file.slot_count() - 1;
            let mut contents = file.read_all()?;
            drop(file);

            if index != last {
                contents.copy_within(last * slot_size..(last + 1) * slot_size, index * slot_size);
            }
            contents.truncate(last * slot_size);

            replace_atomically(&self.config.path, &contents, self.strict_sync())?;
            debug!(key, index, moved_from = last, "deleted slot");
            Ok(Removal::Removed)
        })();

        log_failure("delete", key, result)
    }

    /// Remove every slot whose key starts with `prefix`
    ///
    /// Survivors keep their relative order. Returns the number removed.
    pub fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        if prefix.is_empty() {
            return Err(SlotError::InvalidArgument(
                "prefix is empty; use erase_all to remove every key".to_string(),
            ));
        }
        let _guard = self.acquire()?;

        let result = (|| -> Result<usize> {
            let mut file = self.open_file()?;
            let slot_size = self.config.slot_size;
            let contents = file.read_all()?;
            drop(file);

            let mut kept = Vec::with_capacity(contents.len());
            let mut removed = 0;
            for (index, chunk) in contents.chunks_exact(slot_size).enumerate() {
                let raw = RawSlot::new(chunk, (index * slot_size) as u64)?;
                if raw.key_bytes().starts_with(prefix.as_bytes()) {
                    removed += 1;
                } else {
                    kept.extend_from_slice(chunk);
                }
            }

            if removed > 0 {
                replace_atomically(&self.config.path, &kept, self.strict_sync())?;
            }
            debug!(prefix, removed, "deleted by prefix");
            Ok(removed)
        })();

        log_failure("delete_prefix", prefix, result)
    }

    /// Drop every slot by truncating the file to zero length
    pub fn erase_all(&self) -> Result<()> {
        let _guard = self.acquire()?;

        let result = (|| -> Result<()> {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .open(&self.config.path)?;
            file.set_len(0).map_err(SlotError::Truncate)?;
            if self.config.sync_strategy == SyncStrategy::Always {
                file.sync_all()?;
            }
            info!(path = %self.config.path.display(), "erased all slots");
            Ok(())
        })();

        log_failure("erase_all", "*", result)
    }

    /// Number of slots currently in the file
    pub fn slot_count(&self) -> Result<usize> {
        let _guard = self.acquire()?;

        let result = self.open_file().map(|file| file.slot_count());
        log_failure("slot_count", "*", result)
    }

    /// All keys, in file order
    pub fn keys(&self) -> Result<Vec<String>> {
        let _guard = self.acquire()?;

        let result = (|| -> Result<Vec<String>> {
            let mut file = self.open_file()?;
            let mut keys = Vec::with_capacity(file.slot_count());
            file.scan(|_, raw| {
                keys.push(raw.key());
                Ok(None::<()>)
            })?;
            Ok(keys)
        })();

        log_failure("keys", "*", result)
    }

    /// Scan every slot and report damage without modifying the file
    pub fn verify(&self) -> Result<VerifyReport> {
        let _guard = self.acquire()?;

        let report = log_failure("verify", "*", self.scan_report())?;
        info!(
            total = report.total_slots,
            valid = report.valid_slots,
            checksum_failures = report.checksum_failures,
            corrupt = report.corrupt_slots,
            duplicates = report.duplicate_keys.len(),
            "verified store"
        );
        Ok(report)
    }

    /// A view that prefixes every key with `prefix`
    pub fn namespace(&self, prefix: impl Into<String>) -> Result<Namespace<'_>> {
        Namespace::new(self, prefix)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Integrity scan body of `verify` (called with the lock held)
    fn scan_report(&self) -> Result<VerifyReport> {
        let mut file = self.open_file()?;
        let mut report = VerifyReport::default();
        let mut seen = HashSet::new();

        file.scan(|_, raw| {
            report.total_slots += 1;
            match raw.verify() {
                Ok(()) => report.valid_slots += 1,
                Err(SlotError::ChecksumMismatch { key, offset, .. }) => {
                    warn!(key = %key, offset, "checksum mismatch");
                    report.checksum_failures += 1;
                }
                Err(e) => {
                    warn!(offset = raw.offset(), error = %e, "corrupt slot");
                    report.corrupt_slots += 1;
                }
            }

            let key = raw.key();
            if !seen.insert(key.clone()) && !report.duplicate_keys.contains(&key) {
                report.duplicate_keys.push(key);
            }
            Ok(None::<()>)
        })?;

        Ok(report)
    }

    fn strict_sync(&self) -> bool {
        self.config.sync_strategy == SyncStrategy::Always
    }

    fn acquire(&self) -> Result<MutexGuard<'_, ()>> {
        match self.config.lock_timeout {
            None => Ok(self.lock.lock()),
            Some(timeout) => self.lock.try_lock_for(timeout).ok_or_else(|| {
                warn!(path = %self.config.path.display(), ?timeout, "timed out waiting for store lock");
                SlotError::LockTimeout(timeout)
            }),
        }
    }

    fn open_file(&self) -> Result<SlotFile> {
        SlotFile::open(&self.config.path, self.config.slot_size)
    }
}

fn log_failure<T>(op: &'static str, key: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        if e.is_corruption() {
            tracing::error!(op, key, error = %e, "store file is corrupt");
        } else {
            warn!(op, key, error = %e, "store operation failed");
        }
    }
    result
}
