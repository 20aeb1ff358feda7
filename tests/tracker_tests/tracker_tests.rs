//! Tests for the Slot Tracker
//!
//! These tests verify:
//! - Sequential allocation rolls from one shard into the next
//! - Exhaustion after every slot is handed out, without state change
//! - Reclaimed slots are reused oldest first
//! - Every change is persisted and survives a reload
//! - Damaged tracker files are reported as corrupt

use std::fs;
use std::path::PathBuf;

use rowvault::tracker::{Tracker, TrackerState, MAX_ROWS, MAX_SHARDS, SLOTS_PER_SHARD};
use rowvault::{SlotPointer, VaultError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_tracker() -> (TempDir, PathBuf, Tracker) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tracker.bin");
    let tracker = Tracker::create(&path).unwrap();
    (temp_dir, path, tracker)
}

fn slot(shard_id: u16, slot_id: u16) -> SlotPointer {
    SlotPointer::new(shard_id, slot_id).unwrap()
}

// =============================================================================
// Allocation Tests
// =============================================================================

#[test]
fn test_first_allocation_is_shard_one_slot_one() {
    let (_temp, _path, mut tracker) = setup_tracker();

    let allocation = tracker.allocate_slot().unwrap();

    assert_eq!(allocation.slot, slot(1, 1));
    assert!(!allocation.reused);
}

#[test]
fn test_hundred_and_first_slot_opens_shard_two() {
    let (_temp, _path, mut tracker) = setup_tracker();

    for _ in 0..SLOTS_PER_SHARD {
        tracker.allocate_slot().unwrap();
    }
    let allocation = tracker.allocate_slot().unwrap();

    assert_eq!(allocation.slot, slot(2, 1));
}

#[test]
fn test_exhaustion_after_every_slot() {
    let mut state = TrackerState::default();
    let mut last = None;
    for _ in 0..MAX_ROWS {
        last = Some(state.allocate_slot().unwrap().slot);
    }
    assert_eq!(last, Some(slot(MAX_SHARDS, SLOTS_PER_SHARD)));
    assert_eq!(state.next_slot(), None);

    let before = state.clone();
    let result = state.allocate_slot();

    assert!(matches!(result, Err(VaultError::CapacityExceeded(_))));
    assert_eq!(state, before);
}

#[test]
fn test_reclaimed_slots_are_reused_oldest_first() {
    let mut state = TrackerState::default();
    for _ in 0..5 {
        state.allocate_slot().unwrap();
    }

    state.reclaim(slot(1, 4));
    state.reclaim(slot(1, 2));

    let first = state.allocate_slot().unwrap();
    let second = state.allocate_slot().unwrap();
    let third = state.allocate_slot().unwrap();

    assert_eq!((first.slot, first.reused), (slot(1, 4), true));
    assert_eq!((second.slot, second.reused), (slot(1, 2), true));
    assert_eq!((third.slot, third.reused), (slot(1, 6), false));
}

#[test]
fn test_exhausted_cursor_still_serves_free_list() {
    let mut state = TrackerState::default();
    for _ in 0..MAX_ROWS {
        state.allocate_slot().unwrap();
    }
    state.reclaim(slot(7, 33));

    let allocation = state.allocate_slot().unwrap();

    assert_eq!(allocation.slot, slot(7, 33));
    assert!(allocation.reused);
}

// =============================================================================
// Row Count Tests
// =============================================================================

#[test]
fn test_row_count_limit() {
    let mut state = TrackerState::default();
    for _ in 0..MAX_ROWS {
        state.increment_row_count().unwrap();
    }

    assert!(matches!(
        state.increment_row_count(),
        Err(VaultError::CapacityExceeded(_))
    ));
    assert_eq!(state.row_count(), MAX_ROWS);
    assert!(!state.has_capacity());

    state.decrement_row_count();
    assert_eq!(state.row_count(), MAX_ROWS - 1);
}

#[test]
fn test_decrement_never_goes_negative() {
    let mut state = TrackerState::default();
    state.decrement_row_count();
    assert_eq!(state.row_count(), 0);
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_state_survives_reload() {
    let (_temp, path, mut tracker) = setup_tracker();

    for _ in 0..150 {
        tracker.allocate_slot().unwrap();
        tracker.increment_row_count().unwrap();
    }
    tracker.reclaim(slot(1, 10)).unwrap();
    tracker.reclaim(slot(2, 3)).unwrap();
    tracker.decrement_row_count().unwrap();
    tracker.decrement_row_count().unwrap();

    let reloaded = Tracker::load(&path).unwrap();

    assert_eq!(reloaded.state(), tracker.state());
    assert_eq!(reloaded.row_count(), 148);
    assert_eq!(reloaded.state().next_slot(), Some(slot(2, 51)));
    let free: Vec<_> = reloaded.state().free_list().copied().collect();
    assert_eq!(free, vec![slot(1, 10), slot(2, 3)]);
}

#[test]
fn test_reload_continues_allocation() {
    let (_temp, path, mut tracker) = setup_tracker();
    tracker.allocate_slot().unwrap();
    tracker.allocate_slot().unwrap();
    drop(tracker);

    let mut reloaded = Tracker::load(&path).unwrap();

    assert_eq!(reloaded.allocate_slot().unwrap().slot, slot(1, 3));
}

#[test]
fn test_failed_allocation_is_not_persisted() {
    let (_temp, path, mut tracker) = setup_tracker();
    for _ in 0..MAX_ROWS {
        tracker.allocate_slot().unwrap();
    }

    assert!(tracker.allocate_slot().is_err());

    let reloaded = Tracker::load(&path).unwrap();
    assert_eq!(reloaded.state(), tracker.state());
}

#[test]
fn test_empty_tracker_file_is_corrupt() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tracker.bin");
    fs::write(&path, b"").unwrap();

    assert!(matches!(
        Tracker::load(&path),
        Err(VaultError::CorruptRecord { .. })
    ));
}

#[test]
fn test_truncated_tracker_file_is_corrupt() {
    let (_temp, path, mut tracker) = setup_tracker();
    tracker.allocate_slot().unwrap();

    let bytes = fs::read(&path).unwrap();
    let truncated = path.with_file_name("truncated.bin");
    fs::write(&truncated, &bytes[..bytes.len() - 1]).unwrap();

    assert!(matches!(
        Tracker::load(&truncated),
        Err(VaultError::CorruptRecord { .. })
    ));
}

#[test]
fn test_missing_tracker_file_is_io_error() {
    let temp_dir = TempDir::new().unwrap();

    assert!(matches!(
        Tracker::load(&temp_dir.path().join("absent.bin")),
        Err(VaultError::Io(_))
    ));
}

// =============================================================================
// SlotPointer Tests
// =============================================================================

#[test]
fn test_slot_pointer_bounds_and_parsing() {
    assert!(SlotPointer::new(0, 1).is_err());
    assert!(SlotPointer::new(MAX_SHARDS + 1, 1).is_err());
    assert!(SlotPointer::new(1, SLOTS_PER_SHARD + 1).is_err());

    let parsed: SlotPointer = "3:42".parse().unwrap();
    assert_eq!(parsed, slot(3, 42));
    assert_eq!(parsed.to_string(), "3:42");
    assert!("3-42".parse::<SlotPointer>().is_err());
}
