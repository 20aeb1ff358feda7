//! Configuration for rowvault
//!
//! Centralized configuration with sensible defaults.

use std::path::{Path, PathBuf};

use crate::crypto::hash_key;

/// Built-in encryption key used when the caller does not supply one.
pub const DEFAULT_ENCRYPTION_KEY: &str =
    "37e1f5637615c8ab9474184a2970fdcb8814303f49e56deb6c31cb7a1c12655c";

/// Configuration for one table
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory that holds databases
    /// Internal structure:
    ///   {data_dir}/
    ///     └── {db_name}/
    ///         └── {hash(table_name)}/   (one directory per table)
    pub data_dir: PathBuf,

    /// Database directory name under `data_dir`
    pub db_name: String,

    /// Table name (hashed to produce the table directory)
    pub table_name: String,

    // -------------------------------------------------------------------------
    // Encryption Configuration
    // -------------------------------------------------------------------------
    /// Key used to encrypt payloads and fingerprinted in the sidecar
    pub encryption_key: String,

    /// Whether payloads are encrypted at rest (only honoured at table creation)
    pub encryption_enabled: bool,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// When log files are fsynced
    pub sync_strategy: SyncStrategy,
}

/// Log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every append and rewrite (safest, slowest)
    EveryWrite,

    /// fsync only when a filtered rewrite completes
    OnRewrite,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            db_name: "_rowvault_".to_string(),
            table_name: "default".to_string(),
            encryption_key: DEFAULT_ENCRYPTION_KEY.to_string(),
            encryption_enabled: false,
            sync_strategy: SyncStrategy::EveryWrite,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Directory holding every table of this database
    pub fn database_dir(&self) -> PathBuf {
        self.data_dir.join(&self.db_name)
    }

    /// Directory holding this table's files
    pub fn table_dir(&self) -> PathBuf {
        Self::table_dir_in(&self.database_dir(), &self.table_name)
    }

    pub(crate) fn table_dir_in(database_dir: &Path, table_name: &str) -> PathBuf {
        database_dir.join(hash_key(table_name).as_str())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all databases)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the database name
    pub fn db_name(mut self, name: impl Into<String>) -> Self {
        self.config.db_name = name.into();
        self
    }

    /// Set the table name
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.config.table_name = name.into();
        self
    }

    /// Set the encryption key
    pub fn encryption_key(mut self, key: impl Into<String>) -> Self {
        self.config.encryption_key = key.into();
        self
    }

    /// Enable or disable payload encryption
    pub fn encryption_enabled(mut self, enabled: bool) -> Self {
        self.config.encryption_enabled = enabled;
        self
    }

    /// Set the log sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
