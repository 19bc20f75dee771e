//! Storage backend trait.

use crate::error::StorageResult;

/// An append-only byte store.
///
/// # Invariants
///
/// - `append` returns the offset the bytes were written at, which equals the
///   size before the call
/// - `read_at` returns exactly the bytes previously appended at that offset
/// - after `flush` (and `sync` for metadata) appended bytes survive the process
/// - `truncate` only shrinks
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StorageError::ReadPastEnd`] if the range is not
    /// fully inside the stored bytes.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it starts at.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes appended bytes to the operating system.
    fn flush(&mut self) -> StorageResult<()>;

    /// Makes appended bytes and file metadata durable.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the number of stored bytes.
    fn size(&self) -> StorageResult<u64>;

    /// Discards everything after `new_size`.
    ///
    /// Used to roll back a log group whose commit did not complete.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
