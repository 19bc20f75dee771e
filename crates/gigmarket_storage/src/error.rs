//! Storage errors.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read extended past the end of the stored bytes.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: usize,
        /// Current size.
        size: u64,
    },

    /// A truncation asked for a size larger than the current one.
    #[error("cannot truncate to {requested} bytes, storage holds only {size}")]
    TruncateBeyondEnd {
        /// Requested size.
        requested: u64,
        /// Current size.
        size: u64,
    },

    /// A failure produced by a [`crate::FaultSwitch`].
    #[error("injected fault during {operation}")]
    InjectedFault {
        /// The operation that was failed.
        operation: &'static str,
    },
}
