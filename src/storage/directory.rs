//! Row Directory Log
//!
//! Encrypted raw row keys, kept only so rows can be listed.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::SyncStrategy;
use crate::error::Result;
use crate::swap::{RecordIter, RewriteOutcome, SwapWriter};

use super::{DIRECTORY_BACKUP_FILENAME, DIRECTORY_FILENAME};

/// Ciphertext of one serialized `RowKey`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub encrypted_key: Vec<u8>,
}

#[derive(Debug)]
pub struct RowDirectoryLog {
    log: SwapWriter<DirectoryRecord>,
}

impl RowDirectoryLog {
    pub fn open(table_dir: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        Ok(Self {
            log: SwapWriter::open(
                table_dir.join(DIRECTORY_FILENAME),
                table_dir.join(DIRECTORY_BACKUP_FILENAME),
                sync_strategy,
            )?,
        })
    }

    pub fn append(&self, encrypted_key: Vec<u8>) -> Result<()> {
        self.log.append(&DirectoryRecord { encrypted_key })
    }

    /// Filtered rewrite dropping the entry equal to `encrypted_key`
    pub fn remove(&self, encrypted_key: &[u8]) -> Result<RewriteOutcome> {
        self.log
            .rewrite_filtering(|record| record.encrypted_key == encrypted_key)
    }

    pub fn entries(&self) -> Result<RecordIter<DirectoryRecord>> {
        self.log.read_active()
    }

    pub fn writer(&self) -> &SwapWriter<DirectoryRecord> {
        &self.log
    }
}
