//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// An in-memory byte store.
///
/// Cloning the backend yields another handle onto the *same* buffer. A test
/// can keep one clone, drop the store that owned the other, and reopen a
/// fresh store from the bytes the first one left behind.
///
/// ```rust
/// use gigmarket_storage::{InMemoryBackend, StorageBackend};
///
/// let mut writer = InMemoryBackend::new();
/// let reader = writer.clone();
/// writer.append(b"shared").unwrap();
/// assert_eq!(reader.size().unwrap(), 6);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    bytes: Arc<RwLock<Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend preloaded with `bytes`.
    #[must_use]
    pub fn with_data(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(RwLock::new(bytes)),
        }
    }

    /// Returns a copy of the stored bytes.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let bytes = self.bytes.read();
        let size = bytes.len() as u64;
        let end = offset.saturating_add(len as u64);
        if end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        Ok(bytes[offset as usize..end as usize].to_vec())
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut bytes = self.bytes.write();
        let offset = bytes.len() as u64;
        bytes.extend_from_slice(data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.bytes.read().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut bytes = self.bytes.write();
        let size = bytes.len() as u64;
        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }
        bytes.truncate(new_size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_follow_appends() {
        let mut backend = InMemoryBackend::new();
        assert_eq!(backend.append(b"open").unwrap(), 0);
        assert_eq!(backend.append(b"assigned").unwrap(), 4);
        assert_eq!(backend.size().unwrap(), 12);
        assert_eq!(backend.read_at(4, 8).unwrap(), b"assigned");
    }

    #[test]
    fn read_past_end_is_rejected() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"bid").unwrap();
        assert!(matches!(
            backend.read_at(1, 5),
            Err(StorageError::ReadPastEnd { size: 3, .. })
        ));
    }

    #[test]
    fn clones_share_bytes() {
        let mut a = InMemoryBackend::new();
        let b = a.clone();
        a.append(b"hire").unwrap();
        assert_eq!(b.snapshot(), b"hire");
    }

    #[test]
    fn truncate_rolls_back_tail() {
        let mut backend = InMemoryBackend::with_data(b"committed-partial".to_vec());
        backend.truncate(9).unwrap();
        assert_eq!(backend.snapshot(), b"committed");
        assert!(matches!(
            backend.truncate(100),
            Err(StorageError::TruncateBeyondEnd { requested: 100, size: 9 })
        ));
    }

    proptest::proptest! {
        #[test]
        fn every_append_reads_back(chunks in proptest::collection::vec(
            proptest::collection::vec(proptest::num::u8::ANY, 0..32),
            0..16,
        )) {
            let mut backend = InMemoryBackend::new();
            let offsets: Vec<u64> = chunks
                .iter()
                .map(|chunk| backend.append(chunk).unwrap())
                .collect();
            for (offset, chunk) in offsets.iter().zip(&chunks) {
                proptest::prop_assert_eq!(&backend.read_at(*offset, chunk.len()).unwrap(), chunk);
            }
            let total: usize = chunks.iter().map(Vec::len).sum();
            proptest::prop_assert_eq!(backend.size().unwrap(), total as u64);
        }
    }
}
