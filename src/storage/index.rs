//! Index Log
//!
//! Maps each live row's hashed key to the slot holding its payload.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::SyncStrategy;
use crate::crypto::HashedKey;
use crate::error::Result;
use crate::swap::{RecordIter, RewriteOutcome, SwapWriter};
use crate::tracker::SlotPointer;

use super::{INDEX_BACKUP_FILENAME, INDEX_FILENAME};

/// `{HashedKey → SlotPointer}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub key: HashedKey,
    pub slot: SlotPointer,
}

#[derive(Debug)]
pub struct IndexLog {
    log: SwapWriter<IndexRecord>,
}

impl IndexLog {
    /// Open (creating if needed) the index of the table in `table_dir`
    pub fn open(table_dir: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        Ok(Self {
            log: SwapWriter::open(
                table_dir.join(INDEX_FILENAME),
                table_dir.join(INDEX_BACKUP_FILENAME),
                sync_strategy,
            )?,
        })
    }

    /// Slot of the row with `key`; first match wins
    pub fn lookup(&self, key: &HashedKey) -> Result<Option<SlotPointer>> {
        Ok(self
            .log
            .find_first(|record| record.key == *key)?
            .map(|record| record.slot))
    }

    pub fn append(&self, key: &HashedKey, slot: SlotPointer) -> Result<()> {
        self.log.append(&IndexRecord {
            key: key.clone(),
            slot,
        })
    }

    /// Filtered rewrite dropping the pointer for `key`
    pub fn remove(&self, key: &HashedKey) -> Result<RewriteOutcome> {
        self.log.rewrite_filtering(|record| record.key == *key)
    }

    pub fn entries(&self) -> Result<RecordIter<IndexRecord>> {
        self.log.read_active()
    }

    pub fn writer(&self) -> &SwapWriter<IndexRecord> {
        &self.log
    }
}
