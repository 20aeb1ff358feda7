//! Shard Log
//!
//! Holds the encrypted payload of up to 100 rows.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::SyncStrategy;
use crate::crypto::HashedKey;
use crate::error::Result;
use crate::swap::{check_body_len, RewriteOutcome, SwapWriter};

use super::SHARD_DIR;

/// `{HashedKey → EncryptedPayload}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRecord {
    pub key: HashedKey,
    pub payload: Vec<u8>,
}

/// One shard's log pair
#[derive(Debug)]
pub struct ShardLog {
    shard_id: u16,
    log: SwapWriter<ShardRecord>,
}

impl ShardLog {
    /// Describe shard `shard_id` of the table in `table_dir`; files are
    /// created on the first write
    pub fn new(table_dir: &Path, shard_id: u16, sync_strategy: SyncStrategy) -> Self {
        let (primary, backup) = Self::paths(table_dir, shard_id);
        Self {
            shard_id,
            log: SwapWriter::new(primary, backup, sync_strategy),
        }
    }

    /// "shards/shard_07.log", "shards/shard_07.bak"
    pub fn paths(table_dir: &Path, shard_id: u16) -> (PathBuf, PathBuf) {
        let dir = table_dir.join(SHARD_DIR);
        (
            dir.join(format!("shard_{:02}.log", shard_id)),
            dir.join(format!("shard_{:02}.bak", shard_id)),
        )
    }

    pub fn shard_id(&self) -> u16 {
        self.shard_id
    }

    /// Encrypted payload stored for `key`
    pub fn get(&self, key: &HashedKey) -> Result<Option<Vec<u8>>> {
        Ok(self
            .log
            .find_first(|record| record.key == *key)?
            .map(|record| record.payload))
    }

    pub fn append(&self, key: &HashedKey, payload: Vec<u8>) -> Result<()> {
        self.log.append(&ShardRecord {
            key: key.clone(),
            payload,
        })
    }

    /// Filtered rewrite dropping every record for `key`
    pub fn remove(&self, key: &HashedKey) -> Result<RewriteOutcome> {
        self.log.rewrite_filtering(|record| record.key == *key)
    }

    /// Fail `InvalidArgument` if the record for `key` would be too large
    /// to frame
    pub fn check_fits(key: &HashedKey, payload: &[u8]) -> Result<()> {
        // A (key, bytes) tuple encodes exactly like ShardRecord
        let len = bincode::serialized_size(&(key, payload))?;
        check_body_len(usize::try_from(len).unwrap_or(usize::MAX))?;
        Ok(())
    }

    /// Drop the stale record for `key`, then append the new payload
    ///
    /// The size check runs first, so an oversized payload leaves the old
    /// record in place.
    pub fn replace(&self, key: &HashedKey, payload: Vec<u8>) -> Result<RewriteOutcome> {
        Self::check_fits(key, &payload)?;
        let outcome = self.remove(key)?;
        self.append(key, payload)?;
        Ok(outcome)
    }

    /// Number of records for `key` (exactly one for a live row)
    pub fn occurrences(&self, key: &HashedKey) -> Result<usize> {
        let mut count = 0;
        for record in self.log.read_active()? {
            if record?.key == *key {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn writer(&self) -> &SwapWriter<ShardRecord> {
        &self.log
    }
}
