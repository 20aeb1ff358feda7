//! Tests for Record Framing
//!
//! These tests verify:
//! - Consecutive frames read back from a file with correct offsets
//! - The checksum covers the generation stamp as well as the body
//! - Oversized length headers are rejected before allocation
//! - Oversized bodies are refused when encoding
//! - Torn frames are distinguished from a clean end of stream

use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use rowvault::swap::{encode_frame, read_frame, Frame, FrameRead, HEADER_SIZE, MAX_BODY_LEN};
use rowvault::VaultError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn write_frames(path: &Path, frames: &[(u64, &[u8])]) {
    let mut bytes = Vec::new();
    for (generation, body) in frames {
        bytes.extend_from_slice(&encode_frame(*generation, body).unwrap());
    }
    fs::write(path, bytes).unwrap();
}

fn read_all_frames(path: &Path) -> (Vec<Frame>, FrameRead) {
    let mut reader = BufReader::new(File::open(path).unwrap());
    let mut offset = 0;
    let mut frames = Vec::new();
    loop {
        match read_frame(&mut reader, path, offset).unwrap() {
            FrameRead::Frame(frame) => {
                offset += frame.encoded_len();
                frames.push(frame);
            }
            other => return (frames, other),
        }
    }
}

// =============================================================================
// Sequential Read Tests
// =============================================================================

#[test]
fn test_frames_read_back_in_order_with_offsets() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("frames.log");
    write_frames(&path, &[(1, b"alpha"), (1, b""), (1, b"gamma-gamma")]);

    let (frames, end) = read_all_frames(&path);

    assert!(matches!(end, FrameRead::End));
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].offset, 0);
    assert_eq!(frames[1].offset, (HEADER_SIZE + 5) as u64);
    assert_eq!(frames[2].offset, (HEADER_SIZE * 2 + 5) as u64);
    assert_eq!(frames[1].body, b"");
    assert_eq!(frames[2].body, b"gamma-gamma");
}

#[test]
fn test_torn_final_frame_after_complete_ones() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("frames.log");

    let mut bytes = encode_frame(7, b"complete").unwrap();
    let partial = encode_frame(7, b"incomplete").unwrap();
    bytes.extend_from_slice(&partial[..HEADER_SIZE + 2]);
    fs::write(&path, bytes).unwrap();

    let (frames, end) = read_all_frames(&path);

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].generation, 7);
    assert!(matches!(end, FrameRead::Torn { available } if available == HEADER_SIZE + 2));
}

// =============================================================================
// Integrity Tests
// =============================================================================

#[test]
fn test_generation_is_covered_by_checksum() {
    let mut bytes = encode_frame(5, b"body").unwrap();
    // Generation lives in header bytes 8..16
    bytes[8] ^= 0x01;

    let result = read_frame(&mut bytes.as_slice(), Path::new("mem"), 0);

    assert!(matches!(result, Err(VaultError::CorruptRecord { .. })));
}

#[test]
fn test_oversized_length_is_rejected() {
    let mut bytes = encode_frame(0, b"tiny").unwrap();
    bytes[..4].copy_from_slice(&(MAX_BODY_LEN + 1).to_le_bytes());

    let result = read_frame(&mut bytes.as_slice(), Path::new("mem"), 128);

    match result {
        Err(VaultError::CorruptRecord { offset, .. }) => assert_eq!(offset, 128),
        other => panic!("expected corrupt record, got {:?}", other),
    }
}

#[test]
fn test_corrupt_record_reports_path_and_offset() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("frames.log");

    let first = encode_frame(0, b"fine").unwrap();
    let mut second = encode_frame(0, b"broken").unwrap();
    second[HEADER_SIZE] ^= 0xFF;
    let mut bytes = first.clone();
    bytes.extend_from_slice(&second);
    fs::write(&path, bytes).unwrap();

    let mut reader = BufReader::new(File::open(&path).unwrap());
    let first_read = read_frame(&mut reader, &path, 0).unwrap();
    assert!(matches!(first_read, FrameRead::Frame(_)));

    match read_frame(&mut reader, &path, first.len() as u64) {
        Err(VaultError::CorruptRecord {
            path: reported,
            offset,
            ..
        }) => {
            assert_eq!(reported, path);
            assert_eq!(offset, first.len() as u64);
        }
        other => panic!("expected corrupt record, got {:?}", other),
    }
}

#[test]
fn test_encode_refuses_oversized_body() {
    let body = vec![0u8; MAX_BODY_LEN as usize + 1];

    assert!(matches!(
        encode_frame(0, &body),
        Err(VaultError::InvalidArgument(_))
    ));
    assert!(encode_frame(0, &body[..MAX_BODY_LEN as usize]).is_ok());
}
