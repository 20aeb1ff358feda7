//! Row Store
//!
//! The table façade that coordinates every component.
//!
//! ## Responsibilities
//! - Validate rows and columns against the table metadata
//! - Route each row through IndexLog → SlotPointer → ShardLog
//! - Keep Tracker, IndexLog, ShardLogs and RowDirectoryLog in step
//! - Run every filtered rewrite on a dedicated worker
//!
//! ## Row State Machine
//! ```text
//!             insert                      update / remove
//!   Absent ───────────▶ Present ◀──────────────────────┐
//!     ▲                    │  └────────────────────────┘
//!     └────────────────────┘
//!            drop_row
//! ```
//!
//! ## Consistency
//! The steps of insert and drop_row touch several files in sequence with no
//! commit protocol across them. A crash between steps can leave the logs
//! mutually inconsistent (for example an index pointer whose shard record is
//! gone). Within a single log the swap protocol guarantees that a crash never
//! loses the pre-mutation records.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::crypto::{hash_key, Cipher, HashedKey};
use crate::error::{Result, VaultError};
use crate::metadata::{TableMetadata, METADATA_FILENAME};
use crate::row::{ColumnMap, RowKey, Value};
use crate::storage::{DirectoryRecord, IndexLog, RowDirectoryLog, ShardLog, SHARD_DIR};
use crate::swap::{set_writable, Side};
use crate::tracker::{SlotPointer, Tracker, TrackerState, MAX_ROWS, MAX_SHARDS};
use crate::worker::{run_on_worker, MutationGate, ShutdownHook};

/// One table: its logs, its tracker and its cipher
///
/// ## Concurrency Model: Single Writer
///
/// - **Mutations** (insert/update/remove/drop_row): serialized by `write_lock`
/// - **Reads** (find/check/list_rows/count): take no lock and may observe a
///   transient state while a rewrite swaps files
/// - Only one process may open a table at a time; nothing enforces this
pub struct RowStore {
    config: Config,

    /// Directory holding this table's files
    table_dir: PathBuf,

    /// Sidecar contents (immutable after creation)
    metadata: TableMetadata,

    cipher: Cipher,

    /// Slot allocator, written through on every change
    tracker: Mutex<Tracker>,

    index: IndexLog,

    directory: RowDirectoryLog,

    /// Shard logs, `shards[shard_id - 1]`
    shards: Vec<ShardLog>,

    /// Serializes mutations
    write_lock: Mutex<()>,

    /// In-flight mutation tracking for graceful shutdown
    gate: Arc<MutationGate>,
}

impl RowStore {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const TRACKER_FILENAME: &'static str = "tracker.bin";

    /// Create a new table with the given columns
    ///
    /// Fails `AlreadyExists` if the table directory already exists.
    pub fn create<I, S>(config: Config, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        Self::validate_schema(&config.table_name, &columns)?;

        let table_dir = config.table_dir();
        if table_dir.exists() {
            return Err(VaultError::AlreadyExists(format!(
                "table {:?}",
                config.table_name
            )));
        }

        // Step 1: Directories
        fs::create_dir_all(table_dir.join(SHARD_DIR))?;

        // Step 2: Sidecar
        let metadata = TableMetadata::new(
            &config.table_name,
            columns,
            &config.encryption_key,
            config.encryption_enabled,
        );
        metadata.write(&table_dir.join(METADATA_FILENAME))?;

        // Step 3: Tracker and logs
        let tracker = Tracker::create(&table_dir.join(Self::TRACKER_FILENAME))?;
        let index = IndexLog::open(&table_dir, config.sync_strategy)?;
        let directory = RowDirectoryLog::open(&table_dir, config.sync_strategy)?;

        info!(
            table = %config.table_name,
            columns = ?metadata.columns,
            encrypted = metadata.encryption_enabled,
            "Table created"
        );

        Ok(Self::assemble(config, table_dir, metadata, tracker, index, directory))
    }

    /// Open an existing table
    ///
    /// Fails `NotFound` if the table does not exist and `AccessDenied` if the
    /// configured key does not match the table's key, before any row
    /// operation can run.
    pub fn open(config: Config) -> Result<Self> {
        let table_dir = config.table_dir();
        let metadata_path = table_dir.join(METADATA_FILENAME);

        if !metadata_path.exists() {
            return Err(VaultError::NotFound(format!(
                "no such table {:?}",
                config.table_name
            )));
        }

        let metadata = TableMetadata::read(&metadata_path)?;
        metadata.verify_key(&config.encryption_key)?;

        if metadata.encryption_enabled != config.encryption_enabled {
            warn!(
                table = %metadata.name,
                stored = metadata.encryption_enabled,
                configured = config.encryption_enabled,
                "Ignoring configured encryption flag; using the table's"
            );
        }

        let tracker = Tracker::load(&table_dir.join(Self::TRACKER_FILENAME))?;
        let index = IndexLog::open(&table_dir, config.sync_strategy)?;
        let directory = RowDirectoryLog::open(&table_dir, config.sync_strategy)?;

        let store = Self::assemble(config, table_dir, metadata, tracker, index, directory);

        // Resolve rewrites interrupted before their clear step
        for shard in &store.shards {
            if shard.writer().exists() {
                shard.writer().recover()?;
            }
        }

        info!(
            table = %store.metadata.name,
            rows = store.count(),
            "Table opened"
        );
        Ok(store)
    }

    /// Open the table if it exists, else create it with `columns`
    pub fn open_or_create<I, S>(config: Config, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if config.table_dir().join(METADATA_FILENAME).exists() {
            Self::open(config)
        } else {
            Self::create(config, columns)
        }
    }

    /// Names of every table in the configured database directory
    pub fn tables(config: &Config) -> Result<Vec<String>> {
        let database_dir = config.database_dir();
        if !database_dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&database_dir)? {
            let path = entry?.path().join(METADATA_FILENAME);
            if path.is_file() {
                names.push(TableMetadata::read(&path)?.name);
            }
        }
        names.sort();
        Ok(names)
    }

    // =========================================================================
    // Row Operations
    // =========================================================================

    /// Insert a new row (Absent → Present)
    ///
    /// Steps:
    /// 1. Allocate a slot
    /// 2. Write the shard record
    /// 3. Append the index pointer
    /// 4. Append the directory entry
    /// 5. Increment the row count
    pub fn insert(&self, key: impl Into<RowKey>, columns: ColumnMap) -> Result<()> {
        let key = key.into();
        let _token = self.gate.begin()?;
        let _write_guard = self.write_lock.lock();

        if columns.is_empty() {
            return Err(VaultError::InvalidArgument(format!(
                "row {} has no columns",
                key
            )));
        }
        for column in columns.columns() {
            self.require_column(column)?;
        }

        let hashed = hash_key(&key.to_string());
        if self.index.lookup(&hashed)?.is_some() {
            return Err(VaultError::AlreadyExists(format!("row {}", key)));
        }

        let payload = self.seal(&columns)?;
        ShardLog::check_fits(&hashed, &payload)?;

        let mut tracker = self.tracker.lock();
        if tracker.row_count() >= MAX_ROWS {
            return Err(VaultError::CapacityExceeded(format!(
                "table row limit of {} reached",
                MAX_ROWS
            )));
        }

        // Step 1: Allocate
        let allocation = tracker.allocate_slot()?;
        let shard = self.shard(allocation.slot);

        // Step 2: Shard record; a reused slot's shard is compacted first
        if allocation.reused {
            run_on_worker("shard-rewrite", || shard.replace(&hashed, payload))?;
        } else {
            shard.append(&hashed, payload)?;
        }

        // Step 3: Index pointer
        self.index.append(&hashed, allocation.slot)?;

        // Step 4: Directory entry
        self.directory.append(self.cipher.encrypt(&bincode::serialize(&key)?))?;

        // Step 5: Row count
        tracker.increment_row_count()?;

        debug!(row = %key, slot = %allocation.slot, reused = allocation.reused, "Row inserted");
        Ok(())
    }

    /// Every column of a row
    pub fn find_row(&self, key: impl Into<RowKey>) -> Result<ColumnMap> {
        let key = key.into();
        match self.load_row(&hash_key(&key.to_string()))? {
            Some((_, columns)) => Ok(columns),
            None => Err(VaultError::NotFound(format!("row {}", key))),
        }
    }

    /// One cell of a row
    pub fn find(&self, key: impl Into<RowKey>, column: &str) -> Result<Value> {
        let key = key.into();
        self.require_column(column)?;

        let columns = self.find_row(&key)?;
        columns.get(column).cloned().ok_or_else(|| {
            VaultError::NotFound(format!("column {} of row {}", column, key))
        })
    }

    /// Whether a row (or one of its cells) exists; never fails
    pub fn check(&self, key: impl Into<RowKey>, column: Option<&str>) -> bool {
        let key = key.into();
        match column {
            None => self.find_row(&key).is_ok(),
            Some(column) => self.find(&key, column).is_ok(),
        }
    }

    /// Set one declared column of an existing row (Present → Present)
    ///
    /// This is an upsert: a declared column the row has no cell for is
    /// added rather than reported `NotFound`.
    pub fn update(
        &self,
        key: impl Into<RowKey>,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let key = key.into();
        let value = value.into();
        let _token = self.gate.begin()?;
        let _write_guard = self.write_lock.lock();

        self.require_column(column)?;
        self.rewrite_row(&key, |columns| {
            columns.set(column, value);
            Ok(())
        })?;

        debug!(row = %key, column, "Row updated");
        Ok(())
    }

    /// Remove one cell of an existing row (Present → Present)
    pub fn remove(&self, key: impl Into<RowKey>, column: &str) -> Result<()> {
        let key = key.into();
        let _token = self.gate.begin()?;
        let _write_guard = self.write_lock.lock();

        self.require_column(column)?;
        self.rewrite_row(&key, |columns| match columns.remove(column) {
            Some(_) => Ok(()),
            None => Err(VaultError::NotFound(format!(
                "column {} of row {}",
                column, key
            ))),
        })?;

        debug!(row = %key, column, "Cell removed");
        Ok(())
    }

    /// Delete a row (Present → Absent)
    ///
    /// Steps:
    /// 1. Rewrite IndexLog without the pointer
    /// 2. Reclaim the slot
    /// 3. Rewrite ShardLog without the payload
    /// 4. Rewrite RowDirectoryLog without the key
    /// 5. Decrement the row count
    pub fn drop_row(&self, key: impl Into<RowKey>) -> Result<()> {
        let key = key.into();
        let _token = self.gate.begin()?;
        let _write_guard = self.write_lock.lock();

        let hashed = hash_key(&key.to_string());
        let slot = self
            .index
            .lookup(&hashed)?
            .ok_or_else(|| VaultError::NotFound(format!("row {}", key)))?;

        let mut tracker = self.tracker.lock();

        // Step 1: Index
        run_on_worker("index-rewrite", || self.index.remove(&hashed))?;

        // Step 2: Slot
        tracker.reclaim(slot)?;

        // Step 3: Shard
        let shard = self.shard(slot);
        run_on_worker("shard-rewrite", || shard.remove(&hashed))?;

        // Step 4: Directory
        match self.directory_entry(&key)? {
            Some(record) => {
                run_on_worker("directory-rewrite", || {
                    self.directory.remove(&record.encrypted_key)
                })?;
            }
            None => warn!(row = %key, "Row missing from directory"),
        }

        // Step 5: Row count
        tracker.decrement_row_count()?;

        debug!(row = %key, slot = %slot, "Row dropped");
        Ok(())
    }

    /// Number of live rows
    pub fn count(&self) -> usize {
        self.tracker.lock().row_count() as usize
    }

    /// Every live row key, in insertion order (rewrites preserve order)
    pub fn list_rows(&self) -> Result<Vec<RowKey>> {
        self.directory
            .entries()?
            .map(|record| self.decode_directory_entry(&record?))
            .collect()
    }

    /// Declared columns, in declaration order
    pub fn columns(&self) -> &[String] {
        &self.metadata.columns
    }

    /// A row rendered as a JSON object
    pub fn row_to_json(&self, key: impl Into<RowKey>, pretty: bool) -> Result<String> {
        let json = self.find_row(key)?.to_json();
        Ok(if pretty {
            serde_json::to_string_pretty(&json)?
        } else {
            serde_json::to_string(&json)?
        })
    }

    /// Delete every file of the table
    pub fn drop_table(self) -> Result<()> {
        let _token = self.gate.begin()?;
        let _write_guard = self.write_lock.lock();

        make_tree_writable(&self.table_dir)?;
        fs::remove_dir_all(&self.table_dir)?;

        info!(table = %self.metadata.name, "Table dropped");
        Ok(())
    }

    /// Handle for coordinating a graceful shutdown with in-flight mutations
    pub fn shutdown_hook(&self) -> ShutdownHook {
        ShutdownHook::new(Arc::clone(&self.gate))
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn table_dir(&self) -> &Path {
        &self.table_dir
    }

    pub fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    /// Snapshot of the slot allocator
    pub fn tracker_state(&self) -> TrackerState {
        self.tracker.lock().state().clone()
    }

    pub fn index(&self) -> &IndexLog {
        &self.index
    }

    pub fn directory(&self) -> &RowDirectoryLog {
        &self.directory
    }

    /// Shard log `shard_id` (1-based)
    pub fn shard_log(&self, shard_id: u16) -> Option<&ShardLog> {
        let index = usize::from(shard_id).checked_sub(1)?;
        self.shards.get(index)
    }

    /// Slot currently holding `key`, if the row is live
    pub fn slot_of(&self, key: impl Into<RowKey>) -> Result<Option<SlotPointer>> {
        self.index.lookup(&hash_key(&key.into().to_string()))
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn assemble(
        config: Config,
        table_dir: PathBuf,
        metadata: TableMetadata,
        tracker: Tracker,
        index: IndexLog,
        directory: RowDirectoryLog,
    ) -> Self {
        let cipher = Cipher::new(&config.encryption_key, metadata.encryption_enabled);
        let shards = (1..=MAX_SHARDS)
            .map(|shard_id| ShardLog::new(&table_dir, shard_id, config.sync_strategy))
            .collect();

        Self {
            config,
            table_dir,
            metadata,
            cipher,
            tracker: Mutex::new(tracker),
            index,
            directory,
            shards,
            write_lock: Mutex::new(()),
            gate: Arc::new(MutationGate::default()),
        }
    }

    fn validate_schema(table_name: &str, columns: &[String]) -> Result<()> {
        if table_name.is_empty() {
            return Err(VaultError::InvalidArgument("table name is empty".to_string()));
        }
        if columns.is_empty() {
            return Err(VaultError::InvalidArgument(format!(
                "table {:?} declares no columns",
                table_name
            )));
        }
        for (i, column) in columns.iter().enumerate() {
            if column.is_empty() {
                return Err(VaultError::InvalidArgument("column name is empty".to_string()));
            }
            if columns[..i].contains(column) {
                return Err(VaultError::InvalidArgument(format!(
                    "column {:?} declared twice",
                    column
                )));
            }
        }
        Ok(())
    }

    fn require_column(&self, column: &str) -> Result<()> {
        if !self.metadata.has_column(column) {
            return Err(VaultError::InvalidArgument(format!(
                "column {:?} is not declared; available columns: {:?}",
                column, self.metadata.columns
            )));
        }
        Ok(())
    }

    fn shard(&self, slot: SlotPointer) -> &ShardLog {
        &self.shards[usize::from(slot.shard_id()) - 1]
    }

    /// Fetch a row, apply `mutate`, and rewrite its shard record in place
    fn rewrite_row<F>(&self, key: &RowKey, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut ColumnMap) -> Result<()>,
    {
        let hashed = hash_key(&key.to_string());
        let (slot, mut columns) = self
            .load_row(&hashed)?
            .ok_or_else(|| VaultError::NotFound(format!("row {}", key)))?;

        mutate(&mut columns)?;

        let payload = self.seal(&columns)?;
        let shard = self.shard(slot);
        run_on_worker("shard-rewrite", || shard.replace(&hashed, payload))?;
        Ok(())
    }

    /// Resolve IndexLog → SlotPointer → ShardLog → decrypted ColumnMap
    fn load_row(&self, hashed: &HashedKey) -> Result<Option<(SlotPointer, ColumnMap)>> {
        let Some(slot) = self.index.lookup(hashed)? else {
            return Ok(None);
        };

        let shard = self.shard(slot);
        let Some(payload) = shard.get(hashed)? else {
            warn!(key = %hashed, slot = %slot, "Index points at a slot with no record");
            return Ok(None);
        };

        let plaintext = self.cipher.decrypt(&payload);
        let columns = bincode::deserialize(&plaintext).map_err(|e| VaultError::CorruptRecord {
            path: shard
                .writer()
                .path(shard.writer().active_side().unwrap_or(Side::Primary))
                .to_path_buf(),
            offset: 0,
            reason: format!("undecodable payload for slot {}: {}", slot, e),
        })?;

        Ok(Some((slot, columns)))
    }

    fn seal(&self, columns: &ColumnMap) -> Result<Vec<u8>> {
        Ok(self.cipher.encrypt(&bincode::serialize(columns)?))
    }

    fn decode_directory_entry(&self, record: &DirectoryRecord) -> Result<RowKey> {
        let plaintext = self.cipher.decrypt(&record.encrypted_key);
        bincode::deserialize(&plaintext).map_err(|e| VaultError::CorruptRecord {
            path: self.directory.writer().path(Side::Primary).to_path_buf(),
            offset: 0,
            reason: format!("undecodable row key: {}", e),
        })
    }

    /// The directory record naming `key` (matched by string form)
    fn directory_entry(&self, key: &RowKey) -> Result<Option<DirectoryRecord>> {
        let wanted = key.to_string();
        for record in self.directory.entries()? {
            let record = record?;
            if self.decode_directory_entry(&record)?.to_string() == wanted {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}

/// Restore write permission on every file below `dir` so it can be removed
fn make_tree_writable(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            make_tree_writable(&path)?;
        } else {
            set_writable(&path, true)?;
        }
    }
    Ok(())
}
