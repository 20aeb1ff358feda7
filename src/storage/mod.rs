//! Storage Module
//!
//! The three log kinds a table is made of, each a [`SwapWriter`] with its own
//! record schema.
//!
//! ## Responsibilities
//! - ShardLog: `{HashedKey → encrypted ColumnMap}`, one log per shard
//! - IndexLog: `{HashedKey → SlotPointer}`
//! - RowDirectoryLog: encrypted raw row keys, for listing
//! - Linear-scan lookups, first match wins
//!
//! ## Table Layout
//! ```text
//! {table_dir}/
//!   ├── metadata.json
//!   ├── tracker.bin
//!   ├── index.log   index.bak
//!   ├── rows.log    rows.bak
//!   └── shards/
//!         ├── shard_01.log   shard_01.bak
//!         └── ...            (created on first write, up to shard_10)
//! ```
//!
//! [`SwapWriter`]: crate::swap::SwapWriter

mod directory;
mod index;
mod shard;

pub use directory::{DirectoryRecord, RowDirectoryLog};
pub use index::{IndexLog, IndexRecord};
pub use shard::{ShardLog, ShardRecord};

pub(crate) const INDEX_FILENAME: &str = "index.log";
pub(crate) const INDEX_BACKUP_FILENAME: &str = "index.bak";
pub(crate) const DIRECTORY_FILENAME: &str = "rows.log";
pub(crate) const DIRECTORY_BACKUP_FILENAME: &str = "rows.bak";
pub(crate) const SHARD_DIR: &str = "shards";
