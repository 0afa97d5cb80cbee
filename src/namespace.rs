//! Key namespaces
//!
//! Lets several users share one store file without their keys colliding.
//! The update agent keeps all of its state under the `"ota_"` prefix, so
//! wiping its state never touches anyone else's keys.

use crate::error::{Result, SlotError};
use crate::slot::{validate_key, MAX_KEY_LEN};
use crate::store::{Lookup, Removal, SlotStore};

/// Prefix used by the update agent for its own keys
pub const OTA_PREFIX: &str = "ota_";

/// A borrowed view of a store that prefixes every key
pub struct Namespace<'a> {
    store: &'a SlotStore,
    prefix: String,
}

impl<'a> Namespace<'a> {
    /// Create a namespace; the prefix must itself be a valid key that leaves
    /// room for at least one more byte
    pub fn new(store: &'a SlotStore, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_key(&prefix)?;
        if prefix.len() >= MAX_KEY_LEN {
            return Err(SlotError::InvalidArgument(format!(
                "prefix is {} bytes, leaving no room for keys",
                prefix.len()
            )));
        }
        Ok(Self { store, prefix })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The key as stored in the file
    pub fn full_key(&self, key: &str) -> String {
        let mut full = String::with_capacity(self.prefix.len() + key.len());
        full.push_str(&self.prefix);
        full.push_str(key);
        full
    }

    pub fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.store.set(&self.full_key(key), value)
    }

    pub fn set_with_sync(&self, key: &str, value: &[u8], sync: bool) -> Result<()> {
        self.store.set_with_sync(&self.full_key(key), value, sync)
    }

    pub fn get(&self, key: &str) -> Result<Lookup> {
        self.store.get(&self.full_key(key))
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        self.store.contains(&self.full_key(key))
    }

    pub fn delete(&self, key: &str) -> Result<Removal> {
        self.store.delete(&self.full_key(key))
    }

    /// Keys in this namespace, prefix stripped, in file order
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .keys()?
            .into_iter()
            .filter_map(|k| k.strip_prefix(self.prefix.as_str()).map(str::to_owned))
            .collect())
    }

    /// Remove every key in this namespace; other keys are untouched
    pub fn erase_all(&self) -> Result<usize> {
        self.store.delete_prefix(&self.prefix)
    }
}
