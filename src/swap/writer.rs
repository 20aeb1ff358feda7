//! Swap Writer
//!
//! Appends to, and rewrites, the active file of a PRIMARY/BACKUP pair.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::SyncStrategy;
use crate::error::{Result, VaultError};

use super::frame::encode_frame;
use super::reader::{decode_body, FrameIter, RecordIter};

/// One of the two physical files backing a log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Primary,
    Backup,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Primary => Side::Backup,
            Side::Backup => Side::Primary,
        }
    }
}

/// Result of a filtered rewrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteOutcome {
    /// Records copied to the new active file
    pub kept: usize,
    /// Records matched by the predicate and omitted
    pub dropped: usize,
    /// The file the surviving records were written to
    pub written_to: Side,
}

/// A rewrite whose stream step finished but whose clear step has not run
///
/// Until [`commit`](PendingSwap::commit) both files hold records and the
/// source (lower generation) remains the active one. Dropping a pending swap
/// leaves the log exactly as a crash between the two steps would.
#[must_use = "the stale source file is only cleared by commit()"]
#[derive(Debug)]
pub struct PendingSwap {
    stale: PathBuf,
    outcome: RewriteOutcome,
}

impl PendingSwap {
    /// Records that would survive the rewrite
    pub fn outcome(&self) -> RewriteOutcome {
        self.outcome
    }

    /// Clear the source file, completing the swap
    pub fn commit(self) -> Result<RewriteOutcome> {
        with_writable(&self.stale, |path| {
            let file = File::create(path)?;
            file.sync_all()?;
            Ok(())
        })?;

        debug!(
            stale = %self.stale.display(),
            kept = self.outcome.kept,
            dropped = self.outcome.dropped,
            "Swap committed"
        );
        Ok(self.outcome)
    }
}

/// Generic backup/swap engine for one logical append-only log
///
/// ## Active File Detection
/// The active file is the one whose first record parses. With both files
/// empty, BACKUP is active. If both parse (a rewrite was interrupted before
/// its clear step), the lower generation is the untouched source and wins.
///
/// ## Access Control
/// Both files are read-only at rest. A file is made writable only for the
/// duration of an append, a rewrite into it, or its clear.
pub struct SwapWriter<R> {
    primary: PathBuf,
    backup: PathBuf,
    sync_strategy: SyncStrategy,
    _record: PhantomData<fn() -> R>,
}

impl<R> std::fmt::Debug for SwapWriter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwapWriter")
            .field("primary", &self.primary)
            .field("backup", &self.backup)
            .field("sync_strategy", &self.sync_strategy)
            .finish()
    }
}

impl<R: Serialize + DeserializeOwned> SwapWriter<R> {
    /// Describe a log pair without touching the filesystem
    pub fn new(
        primary: impl Into<PathBuf>,
        backup: impl Into<PathBuf>,
        sync_strategy: SyncStrategy,
    ) -> Self {
        Self {
            primary: primary.into(),
            backup: backup.into(),
            sync_strategy,
            _record: PhantomData,
        }
    }

    /// Create the pair if missing and resolve any interrupted rewrite
    pub fn open(
        primary: impl Into<PathBuf>,
        backup: impl Into<PathBuf>,
        sync_strategy: SyncStrategy,
    ) -> Result<Self> {
        let writer = Self::new(primary, backup, sync_strategy);
        writer.ensure_files()?;
        writer.recover()?;
        Ok(writer)
    }

    pub fn path(&self, side: Side) -> &Path {
        match side {
            Side::Primary => &self.primary,
            Side::Backup => &self.backup,
        }
    }

    /// Whether either file of the pair exists on disk
    pub fn exists(&self) -> bool {
        self.primary.exists() || self.backup.exists()
    }

    /// Create both files (empty, read-only) if they do not exist yet
    pub fn ensure_files(&self) -> Result<()> {
        for path in [&self.primary, &self.backup] {
            if !path.exists() {
                File::create(path)?;
                set_writable(path, false)?;
            }
        }
        Ok(())
    }

    /// Discard the copy left behind by a rewrite interrupted before its clear
    /// step. Returns the side that was cleared, if any.
    pub fn recover(&self) -> Result<Option<Side>> {
        let primary = Self::probe(&self.primary)?;
        let backup = Self::probe(&self.backup)?;

        let (Some(primary_gen), Some(backup_gen)) = (primary, backup) else {
            return Ok(None);
        };

        let stale = if primary_gen <= backup_gen {
            Side::Backup
        } else {
            Side::Primary
        };

        warn!(
            primary = %self.primary.display(),
            primary_gen,
            backup_gen,
            cleared = ?stale,
            "Both log files hold records; discarding incomplete rewrite"
        );

        with_writable(self.path(stale), |path| {
            let file = File::create(path)?;
            file.sync_all()?;
            Ok(())
        })?;

        Ok(Some(stale))
    }

    /// Which file currently holds the readable record sequence
    pub fn active_side(&self) -> Result<Side> {
        Ok(self.resolve()?.0)
    }

    /// Lazy iterator over the active file's records
    pub fn read_active(&self) -> Result<RecordIter<R>> {
        let (side, _) = self.resolve()?;
        Ok(RecordIter::new(FrameIter::open(self.path(side))?))
    }

    /// First record matching `pred`, scanning the active file in order
    pub fn find_first<P>(&self, mut pred: P) -> Result<Option<R>>
    where
        P: FnMut(&R) -> bool,
    {
        for record in self.read_active()? {
            let record = record?;
            if pred(&record) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Number of records in the active file
    pub fn record_count(&self) -> Result<usize> {
        let (side, _) = self.resolve()?;
        let mut count = 0;
        for frame in FrameIter::open(self.path(side))? {
            frame?;
            count += 1;
        }
        Ok(count)
    }

    /// Append one record to the end of the active file
    pub fn append(&self, record: &R) -> Result<()> {
        self.ensure_files()?;

        let (side, generation) = self.resolve()?;
        let bytes = encode_frame(generation, &bincode::serialize(record)?)?;
        let sync = self.sync_strategy == SyncStrategy::EveryWrite;
        let clean_len = Self::clean_len(self.path(side))?;

        with_writable(self.path(side), |path| {
            let mut file = OpenOptions::new().append(true).open(path)?;
            // Never write behind a partial record left by an interrupted append
            if file.metadata()?.len() > clean_len {
                warn!(
                    path = %path.display(),
                    clean_len,
                    "Truncating torn record before append"
                );
                file.set_len(clean_len)?;
            }
            file.write_all(&bytes)?;
            if sync {
                file.sync_data()?;
            }
            Ok(())
        })
    }

    /// Stream the active file into the inactive one, omitting every record
    /// for which `should_drop` returns true. The source is left intact; call
    /// [`PendingSwap::commit`] to clear it.
    pub fn begin_rewrite<F>(&self, mut should_drop: F) -> Result<PendingSwap>
    where
        F: FnMut(&R) -> bool,
    {
        self.ensure_files()?;

        let (source, generation) = self.resolve()?;
        let target = source.other();
        let source_path = self.path(source).to_path_buf();

        let mut kept = 0;
        let mut dropped = 0;

        with_writable(self.path(target), |path| {
            let file = OpenOptions::new().write(true).truncate(true).open(path)?;
            let mut out = BufWriter::new(file);

            for frame in FrameIter::open(&source_path)? {
                let frame = frame?;
                let record: R = decode_body(&frame, &source_path)?;
                if should_drop(&record) {
                    dropped += 1;
                    continue;
                }
                out.write_all(&encode_frame(generation + 1, &frame.body)?)?;
                kept += 1;
            }

            let file = out.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
            Ok(())
        })?;

        debug!(
            source = %source_path.display(),
            kept,
            dropped,
            generation = generation + 1,
            "Rewrite streamed"
        );

        Ok(PendingSwap {
            stale: source_path,
            outcome: RewriteOutcome {
                kept,
                dropped,
                written_to: target,
            },
        })
    }

    /// Filtered rewrite: stream, then clear the stale source
    pub fn rewrite_filtering<F>(&self, should_drop: F) -> Result<RewriteOutcome>
    where
        F: FnMut(&R) -> bool,
    {
        self.begin_rewrite(should_drop)?.commit()
    }

    /// Delete both files
    pub fn remove_files(&self) -> Result<()> {
        for path in [&self.primary, &self.backup] {
            match set_writable(path, true) {
                Ok(()) => fs::remove_file(path)?,
                Err(VaultError::Io(e)) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Active side and the generation its records carry
    fn resolve(&self) -> Result<(Side, u64)> {
        let primary = Self::probe(&self.primary)?;
        let backup = Self::probe(&self.backup)?;

        Ok(match (primary, backup) {
            (Some(p), Some(b)) if p <= b => (Side::Primary, p),
            (Some(_), Some(b)) => (Side::Backup, b),
            (Some(p), None) => (Side::Primary, p),
            (None, Some(b)) => (Side::Backup, b),
            (None, None) => (Side::Backup, 0),
        })
    }

    /// Byte length of the complete frames at the start of `path`
    fn clean_len(path: &Path) -> Result<u64> {
        let mut len = 0;
        for frame in FrameIter::open(path)? {
            len += frame?.encoded_len();
        }
        Ok(len)
    }

    /// Generation of the first record, or None on immediate end of stream
    fn probe(path: &Path) -> Result<Option<u64>> {
        match FrameIter::open(path)?.next() {
            Some(Ok(frame)) => Ok(Some(frame.generation)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// Run `f` with `path` temporarily writable, restoring read-only afterwards
fn with_writable<T>(path: &Path, f: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
    set_writable(path, true)?;
    let result = f(path);
    let restored = set_writable(path, false);
    let value = result?;
    restored?;
    Ok(value)
}

pub(crate) fn set_writable(path: &Path, writable: bool) -> Result<()> {
    let mut perms = fs::metadata(path)?.permissions();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(if writable { 0o644 } else { 0o444 });
    }

    #[cfg(not(unix))]
    perms.set_readonly(!writable);

    fs::set_permissions(path, perms)?;
    Ok(())
}
