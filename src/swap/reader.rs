//! Swap Log Reader
//!
//! Lazy iteration over the records of one physical log file.

use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{Result, VaultError};

use super::frame::{read_frame, Frame, FrameRead};

/// Iterator over raw frames of a file
///
/// A missing file reads as empty. A torn tail ends the stream; a corrupt
/// frame yields one error and then ends the stream.
pub(crate) struct FrameIter {
    reader: Option<BufReader<File>>,
    path: PathBuf,
    offset: u64,
}

impl FrameIter {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let reader = match File::open(path) {
            Ok(file) => Some(BufReader::new(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            reader,
            path: path.to_path_buf(),
            offset: 0,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for FrameIter {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;

        match read_frame(reader, &self.path, self.offset) {
            Ok(FrameRead::Frame(frame)) => {
                self.offset += frame.encoded_len();
                Some(Ok(frame))
            }
            Ok(FrameRead::End) => {
                self.reader = None;
                None
            }
            Ok(FrameRead::Torn { available }) => {
                warn!(
                    path = %self.path.display(),
                    offset = self.offset,
                    bytes = available,
                    "Ignoring torn record at end of log"
                );
                self.reader = None;
                None
            }
            Err(e) => {
                self.reader = None;
                Some(Err(e))
            }
        }
    }
}

/// Lazy, finite iterator over the decoded records of a log's active file
///
/// Obtained from [`SwapWriter::read_active`](super::SwapWriter::read_active);
/// call it again to restart from the first record.
pub struct RecordIter<R> {
    frames: FrameIter,
    _record: PhantomData<fn() -> R>,
}

impl<R: DeserializeOwned> RecordIter<R> {
    pub(crate) fn new(frames: FrameIter) -> Self {
        Self {
            frames,
            _record: PhantomData,
        }
    }

    /// Path of the file being read
    pub fn path(&self) -> &Path {
        self.frames.path()
    }
}

impl<R: DeserializeOwned> Iterator for RecordIter<R> {
    type Item = Result<R>;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = match self.frames.next()? {
            Ok(frame) => frame,
            Err(e) => return Some(Err(e)),
        };

        Some(decode_body(&frame, self.frames.path()))
    }
}

/// Decode a frame body into a record
pub(crate) fn decode_body<R: DeserializeOwned>(frame: &Frame, path: &Path) -> Result<R> {
    bincode::deserialize(&frame.body).map_err(|e| VaultError::CorruptRecord {
        path: path.to_path_buf(),
        offset: frame.offset,
        reason: format!("undecodable record body: {}", e),
    })
}
