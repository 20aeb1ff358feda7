//! Slot Tracker
//!
//! Allocates storage slots across the table's shards and counts live rows.
//!
//! ## Responsibilities
//! - Hand out slots in order: shard 1 slots 1..=100, then shard 2, ...
//! - Reuse reclaimed slots first, oldest first
//! - Enforce the 1,000-row table limit
//! - Persist the whole state on every change (it is small and bounded)

use std::collections::VecDeque;
use std::fmt;
use std::fs::{self, File};
use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, VaultError};
use crate::swap::{encode_frame, read_frame, set_writable, FrameRead};

/// Number of shard logs per table
pub const MAX_SHARDS: u16 = 10;

/// Slots (live records) per shard log
pub const SLOTS_PER_SHARD: u16 = 100;

/// Maximum live rows per table
pub const MAX_ROWS: u32 = MAX_SHARDS as u32 * SLOTS_PER_SHARD as u32;

// =============================================================================
// SlotPointer
// =============================================================================

/// Identifies one storage slot: `(shard_id ∈ [1,10], slot_id ∈ [1,100])`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotPointer {
    shard_id: u16,
    slot_id: u16,
}

impl SlotPointer {
    /// The first slot handed out by a fresh tracker
    pub const FIRST: SlotPointer = SlotPointer {
        shard_id: 1,
        slot_id: 1,
    };

    pub fn new(shard_id: u16, slot_id: u16) -> Result<Self> {
        if !(1..=MAX_SHARDS).contains(&shard_id) || !(1..=SLOTS_PER_SHARD).contains(&slot_id) {
            return Err(VaultError::InvalidArgument(format!(
                "slot {}:{} outside 1..={}:1..={}",
                shard_id, slot_id, MAX_SHARDS, SLOTS_PER_SHARD
            )));
        }
        Ok(Self { shard_id, slot_id })
    }

    pub fn shard_id(&self) -> u16 {
        self.shard_id
    }

    pub fn slot_id(&self) -> u16 {
        self.slot_id
    }

    /// The slot after this one, rolling into the next shard after slot 100.
    /// None once the last shard is exhausted.
    pub fn successor(&self) -> Option<SlotPointer> {
        if self.slot_id < SLOTS_PER_SHARD {
            Some(Self {
                shard_id: self.shard_id,
                slot_id: self.slot_id + 1,
            })
        } else if self.shard_id < MAX_SHARDS {
            Some(Self {
                shard_id: self.shard_id + 1,
                slot_id: 1,
            })
        } else {
            None
        }
    }
}

impl fmt::Display for SlotPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.shard_id, self.slot_id)
    }
}

impl FromStr for SlotPointer {
    type Err = VaultError;

    /// "3:42" → shard 3, slot 42
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || VaultError::InvalidArgument(format!("malformed slot pointer {:?}", s));

        let (shard, slot) = s.split_once(':').ok_or_else(invalid)?;
        let shard = shard.parse().map_err(|_| invalid())?;
        let slot = slot.parse().map_err(|_| invalid())?;
        Self::new(shard, slot)
    }
}

// =============================================================================
// TrackerState
// =============================================================================

/// A slot handed out by [`TrackerState::allocate_slot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub slot: SlotPointer,
    /// True when the slot came off the free list (its shard may still hold
    /// records written under earlier keys)
    pub reused: bool,
}

/// In-memory allocator state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerState {
    /// Next never-used slot; None once every shard has been filled
    next_slot: Option<SlotPointer>,
    /// Reclaimed slots, oldest first
    free_list: VecDeque<SlotPointer>,
    row_count: u32,
}

impl Default for TrackerState {
    fn default() -> Self {
        Self {
            next_slot: Some(SlotPointer::FIRST),
            free_list: VecDeque::new(),
            row_count: 0,
        }
    }
}

impl TrackerState {
    /// Pop the oldest reclaimed slot, else advance the cursor
    ///
    /// Fails with `CapacityExceeded` without changing state when the free
    /// list is empty and the cursor is exhausted.
    pub fn allocate_slot(&mut self) -> Result<Allocation> {
        if let Some(slot) = self.free_list.pop_front() {
            return Ok(Allocation { slot, reused: true });
        }

        let slot = self.next_slot.ok_or_else(|| {
            VaultError::CapacityExceeded(format!(
                "all {} shards of {} slots are allocated",
                MAX_SHARDS, SLOTS_PER_SHARD
            ))
        })?;
        self.next_slot = slot.successor();

        Ok(Allocation {
            slot,
            reused: false,
        })
    }

    pub fn reclaim(&mut self, slot: SlotPointer) {
        self.free_list.push_back(slot);
    }

    pub fn increment_row_count(&mut self) -> Result<()> {
        if self.row_count >= MAX_ROWS {
            return Err(VaultError::CapacityExceeded(format!(
                "table row limit of {} reached",
                MAX_ROWS
            )));
        }
        self.row_count += 1;
        Ok(())
    }

    pub fn decrement_row_count(&mut self) {
        self.row_count = self.row_count.saturating_sub(1);
    }

    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    pub fn next_slot(&self) -> Option<SlotPointer> {
        self.next_slot
    }

    pub fn free_list(&self) -> impl Iterator<Item = &SlotPointer> {
        self.free_list.iter()
    }

    /// Whether another row could be inserted right now
    pub fn has_capacity(&self) -> bool {
        self.row_count < MAX_ROWS && (!self.free_list.is_empty() || self.next_slot.is_some())
    }
}

// =============================================================================
// Tracker (persisted)
// =============================================================================

/// `TrackerState` bound to its file; every mutation is written through
#[derive(Debug)]
pub struct Tracker {
    path: PathBuf,
    state: TrackerState,
}

impl Tracker {
    /// Write a fresh tracker to `path`
    pub fn create(path: &Path) -> Result<Self> {
        let tracker = Self {
            path: path.to_path_buf(),
            state: TrackerState::default(),
        };
        tracker.persist()?;
        Ok(tracker)
    }

    /// Load a tracker previously written to `path`
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let corrupt = |reason: String| VaultError::CorruptRecord {
            path: path.to_path_buf(),
            offset: 0,
            reason,
        };

        let frame = match read_frame(&mut Cursor::new(&bytes), path, 0)? {
            FrameRead::Frame(frame) => frame,
            FrameRead::End => return Err(corrupt("tracker file is empty".to_string())),
            FrameRead::Torn { available } => {
                return Err(corrupt(format!("tracker record truncated at {} bytes", available)))
            }
        };

        let state = bincode::deserialize(&frame.body)
            .map_err(|e| corrupt(format!("undecodable tracker state: {}", e)))?;

        Ok(Self {
            path: path.to_path_buf(),
            state,
        })
    }

    pub fn allocate_slot(&mut self) -> Result<Allocation> {
        let allocation = self.state.allocate_slot()?;
        self.persist()?;
        debug!(slot = %allocation.slot, reused = allocation.reused, "Slot allocated");
        Ok(allocation)
    }

    pub fn reclaim(&mut self, slot: SlotPointer) -> Result<()> {
        self.state.reclaim(slot);
        self.persist()?;
        debug!(slot = %slot, "Slot reclaimed");
        Ok(())
    }

    pub fn increment_row_count(&mut self) -> Result<()> {
        self.state.increment_row_count()?;
        self.persist()
    }

    pub fn decrement_row_count(&mut self) -> Result<()> {
        self.state.decrement_row_count();
        self.persist()
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn row_count(&self) -> u32 {
        self.state.row_count()
    }

    /// Replace the file atomically: write a temp file, then rename over it
    fn persist(&self) -> Result<()> {
        let body = bincode::serialize(&self.state)?;
        let tmp = self.path.with_extension("tmp");

        match fs::remove_file(&tmp) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        {
            let mut file = File::create(&tmp)?;
            file.write_all(&encode_frame(0, &body)?)?;
            file.sync_all()?;
        }
        set_writable(&tmp, false)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
