//! Write-ahead log.
//!
//! Every commit is appended to the log before it becomes visible. On open,
//! the log is replayed to rebuild the in-memory state.
//!
//! ## Record Format
//!
//! ```text
//! | magic "GWAL" (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! ## Groups
//!
//! A transaction is written as `Begin, Put*, Commit`. If any part of the
//! group fails to reach the backend, the log is cut back to where the group
//! started. Replay only applies groups that end in `Commit`.
//!
//! ## Recovery Policy
//!
//! Tolerated (treated as the clean end of the log, then truncated away):
//! - fewer bytes than a header at the tail
//! - a payload or checksum running past the tail
//!
//! Fatal (the store refuses to open):
//! - bad magic, unsupported version or unknown record type
//! - checksum mismatch

mod record;
mod writer;

pub use record::{compute_crc32, LogRecord, LogRecordType};
pub(crate) use writer::{CommittedGroup, GroupWrite};
pub use writer::WriteAheadLog;
