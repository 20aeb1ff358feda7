//! Record framing
//!
//! Encodes and decodes the `[len][crc][generation][body]` frame around each
//! serialized record.

use std::io::{ErrorKind, Read};
use std::path::Path;

use crate::error::{Result, VaultError};

/// Header size: Len (4) + CRC (4) + Generation (8) = 16 bytes
pub const HEADER_SIZE: usize = 16;

/// Maximum body size (16 MB)
pub const MAX_BODY_LEN: u32 = 16 * 1024 * 1024;

/// A complete, checksum-verified record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Byte offset of the frame within its file
    pub offset: u64,
    pub generation: u64,
    pub body: Vec<u8>,
}

impl Frame {
    /// Size of the frame on disk
    pub fn encoded_len(&self) -> u64 {
        (HEADER_SIZE + self.body.len()) as u64
    }
}

/// Outcome of reading one frame from a stream
#[derive(Debug)]
pub enum FrameRead {
    Frame(Frame),
    /// Clean end of stream at a frame boundary
    End,
    /// Stream ended inside a frame (an interrupted append)
    Torn { available: usize },
}

/// Reject a body the reader would refuse as oversized
pub fn check_body_len(len: usize) -> Result<u32> {
    match u32::try_from(len) {
        Ok(n) if n <= MAX_BODY_LEN => Ok(n),
        _ => Err(VaultError::InvalidArgument(format!(
            "record of {} bytes exceeds maximum {}",
            len, MAX_BODY_LEN
        ))),
    }
}

/// Encode a body into a frame
///
/// Fails `InvalidArgument` if the body is larger than [`MAX_BODY_LEN`].
pub fn encode_frame(generation: u64, body: &[u8]) -> Result<Vec<u8>> {
    let body_len = check_body_len(body.len())?;
    let generation_bytes = generation.to_le_bytes();

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&generation_bytes);
    hasher.update(body);
    let crc = hasher.finalize();

    let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
    out.extend_from_slice(&body_len.to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&generation_bytes);
    out.extend_from_slice(body);
    Ok(out)
}

/// Read the next frame from `reader`, which is positioned at `offset` in `path`
pub fn read_frame<R: Read>(reader: &mut R, path: &Path, offset: u64) -> Result<FrameRead> {
    let mut header = [0u8; HEADER_SIZE];
    let n = read_up_to(reader, &mut header)?;
    if n == 0 {
        return Ok(FrameRead::End);
    }
    if n < HEADER_SIZE {
        return Ok(FrameRead::Torn { available: n });
    }

    let body_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    let mut generation_bytes = [0u8; 8];
    generation_bytes.copy_from_slice(&header[8..16]);

    if body_len > MAX_BODY_LEN {
        return Err(VaultError::CorruptRecord {
            path: path.to_path_buf(),
            offset,
            reason: format!("record length {} exceeds maximum {}", body_len, MAX_BODY_LEN),
        });
    }

    let mut body = vec![0u8; body_len as usize];
    let n = read_up_to(reader, &mut body)?;
    if n < body.len() {
        return Ok(FrameRead::Torn {
            available: HEADER_SIZE + n,
        });
    }

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&generation_bytes);
    hasher.update(&body);
    let actual_crc = hasher.finalize();

    if actual_crc != expected_crc {
        return Err(VaultError::CorruptRecord {
            path: path.to_path_buf(),
            offset,
            reason: format!(
                "checksum mismatch: expected {:#010x}, got {:#010x}",
                expected_crc, actual_crc
            ),
        });
    }

    Ok(FrameRead::Frame(Frame {
        offset,
        generation: u64::from_le_bytes(generation_bytes),
        body,
    }))
}

/// Like `read_exact`, but reports how many bytes were read before EOF
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
