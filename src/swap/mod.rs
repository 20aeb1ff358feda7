//! Swap Log Module
//!
//! One logical append-only log backed by two physical files.
//!
//! ## Responsibilities
//! - Self-delimited, checksummed record framing
//! - Detect the active file by attempting to parse its first record
//! - O(1) appends to the active file
//! - Filtered rewrites that stream the active file into its counterpart,
//!   then clear the original, so a log is never loaded fully into memory
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Record 1                                             │
//! │ ┌─────────┬─────────┬────────────────┬─────────────┐ │
//! │ │ Len (4) │ CRC (4) │ Generation (8) │ Body (Len)  │ │
//! │ └─────────┴─────────┴────────────────┴─────────────┘ │
//! ├──────────────────────────────────────────────────────┤
//! │ Record 2 ...                                         │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! CRC covers generation + body. Every record of a file carries the same
//! generation; a rewrite stamps its output with `source generation + 1`.
//!
//! ## Swap Cycle
//! ```text
//!   PRIMARY (active, gen g)      BACKUP (empty)
//!        │  stream, skipping dropped records
//!        └────────────────────────────▶ BACKUP (gen g+1)
//!   clear PRIMARY                    BACKUP is now active
//! ```

mod frame;
mod reader;
mod writer;

pub use frame::{check_body_len, encode_frame, read_frame, Frame, FrameRead, HEADER_SIZE, MAX_BODY_LEN};
pub use reader::RecordIter;
pub use writer::{PendingSwap, RewriteOutcome, Side, SwapWriter};

pub(crate) use writer::set_writable;
