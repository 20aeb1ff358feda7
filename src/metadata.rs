//! Table metadata sidecar
//!
//! Written once at table creation, read on every open.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crypto::{hash_key, HashedKey};
use crate::error::{Result, VaultError};
use crate::swap::set_writable;

/// Sidecar file name inside a table directory
pub const METADATA_FILENAME: &str = "metadata.json";

/// Current sidecar format version
pub const FORMAT_VERSION: u32 = 1;

/// Table name, declared columns, key fingerprint and encryption flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: String,
    pub columns: Vec<String>,
    pub key_fingerprint: HashedKey,
    pub encryption_enabled: bool,
    pub format_version: u32,
}

impl TableMetadata {
    pub fn new(name: &str, columns: Vec<String>, encryption_key: &str, encryption_enabled: bool) -> Self {
        Self {
            name: name.to_string(),
            columns,
            key_fingerprint: hash_key(encryption_key),
            encryption_enabled,
            format_version: FORMAT_VERSION,
        }
    }

    /// Write the sidecar; fails if one already exists
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(VaultError::AlreadyExists(format!(
                    "table metadata {}",
                    path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&json)?;
        file.sync_all()?;
        drop(file);

        set_writable(path, false)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let metadata: Self = serde_json::from_slice(&bytes)?;

        if metadata.format_version != FORMAT_VERSION {
            return Err(VaultError::CorruptRecord {
                path: path.to_path_buf(),
                offset: 0,
                reason: format!("unsupported format version {}", metadata.format_version),
            });
        }
        Ok(metadata)
    }

    /// Reject a key whose fingerprint differs from the table's
    pub fn verify_key(&self, encryption_key: &str) -> Result<()> {
        if hash_key(encryption_key) != self.key_fingerprint {
            return Err(VaultError::AccessDenied(format!(
                "encryption key does not match table {:?}",
                self.name
            )));
        }
        Ok(())
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}
