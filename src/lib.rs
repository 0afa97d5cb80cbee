//! # slotkv
//!
//! A minimal persistent key-value store for an embedded update agent:
//! - One flat file of fixed-size slots, no header, no index
//! - Linear scan lookups, in-place updates, append on insert
//! - Swap-remove deletes committed with an atomic file replace
//! - CRC32 checksums on every value, verified on read
//! - One store-wide lock serializing all operations
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Callers (any thread)                        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 SlotStore / Namespace                       │
//! │            (Mutex: one operation at a time)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  SlotFile   │          │    Slot     │
//!   │ (scan/I/O)  │          │  (codec)    │
//!   └──────┬──────┘          └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │  uota.kv    │
//!   │  N × slot   │
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod slot;
pub mod file;
pub mod store;
pub mod namespace;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{SlotError, Result};
pub use config::{Config, SyncStrategy};
pub use namespace::{Namespace, OTA_PREFIX};
pub use store::{Lookup, Removal, SlotStore, VerifyReport};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of slotkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
