//! # rowvault
//!
//! An embedded, file-backed row store with:
//! - Sharded append-only row logs (10 shards × 100 rows per table)
//! - A hash-based row index that never stores plaintext keys
//! - Slot allocation with free-list reuse
//! - Backup/swap rewrites that mutate a log without loading it into memory
//! - Optional encryption of payloads at rest
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         RowStore                            │
//! │        insert / find / update / remove / drop_row           │
//! └──────┬──────────────┬───────────────┬───────────────┬───────┘
//!        │              │               │               │
//!        ▼              ▼               ▼               ▼
//!  ┌───────────┐  ┌───────────┐  ┌─────────────┐  ┌──────────────┐
//!  │  Tracker  │  │ IndexLog  │  │ ShardLog ×10│  │RowDirectoryLog│
//!  │  (slots)  │  │key → slot │  │key → payload│  │  raw keys    │
//!  └───────────┘  └─────┬─────┘  └──────┬──────┘  └──────┬───────┘
//!                       │               │                │
//!                       ▼               ▼                ▼
//!                 ┌───────────────────────────────────────────┐
//!                 │     SwapWriter (PRIMARY ⇄ BACKUP files)   │
//!                 └───────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use rowvault::{ColumnMap, Config, RowStore, Value};
//!
//! # fn main() -> rowvault::Result<()> {
//! let config = Config::builder()
//!     .data_dir("/tmp/rowvault")
//!     .table_name("people")
//!     .build();
//! let store = RowStore::open_or_create(config, ["name", "age"])?;
//!
//! let row: ColumnMap = [("name", Value::from("Alice")), ("age", Value::from(30))]
//!     .into_iter()
//!     .collect();
//! store.insert("1", row)?;
//! assert_eq!(store.find("1", "name")?, Value::from("Alice"));
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod crypto;
pub mod metadata;
pub mod row;
pub mod storage;
pub mod store;
pub mod swap;
pub mod tracker;
pub mod worker;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, SyncStrategy};
pub use error::{Result, VaultError};
pub use row::{ColumnMap, RowKey, Value};
pub use store::RowStore;
pub use tracker::SlotPointer;
pub use worker::ShutdownHook;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of rowvault
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
