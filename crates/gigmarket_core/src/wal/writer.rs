//! Log writer and recovery scanner.

use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use crate::model::Collection;
use crate::types::{SequenceNumber, TransactionId};
use crate::wal::record::{
    compute_crc32, LogRecord, LogRecordType, CRC_SIZE, HEADER_SIZE, LOG_MAGIC, LOG_VERSION,
};
use gigmarket_storage::StorageBackend;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, warn};

/// One record image inside a commit group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GroupWrite {
    pub collection: Collection,
    pub entity_id: EntityId,
    pub payload: Vec<u8>,
}

/// A group that reached its `Commit` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommittedGroup {
    /// Offset of the group's `Begin` record.
    pub offset: u64,
    pub txid: TransactionId,
    pub sequence: SequenceNumber,
    pub writes: Vec<GroupWrite>,
}

/// Result of parsing the raw log bytes.
struct Scan {
    records: Vec<(u64, LogRecord)>,
    /// End of the last complete record.
    valid_len: u64,
}

/// Append-only log of commit groups over a [`StorageBackend`].
pub struct WriteAheadLog {
    backend: Mutex<Box<dyn StorageBackend>>,
    /// Whether to `sync` after every group, on top of the flush.
    sync_on_commit: bool,
    /// Set when a failed group could not be cut back out of the log.
    poisoned: AtomicBool,
}

impl WriteAheadLog {
    /// Creates a log over `backend`.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_commit,
            poisoned: AtomicBool::new(false),
        }
    }

    /// Appends `Begin, Put*, Commit` for one transaction and flushes.
    ///
    /// Returns the offset of the `Begin` record. On error the log is cut back
    /// to that offset, so nothing of the group survives a reopen.
    ///
    /// If the cut itself fails, an `Abort` for the group is appended instead
    /// and the log is poisoned: every later append fails with
    /// [`CoreError::LogPoisoned`] until the log is reopened.
    pub(crate) fn append_group(
        &self,
        txid: TransactionId,
        sequence: SequenceNumber,
        writes: &[GroupWrite],
    ) -> CoreResult<u64> {
        let mut backend = self.backend.lock();
        if self.is_poisoned() {
            return Err(CoreError::LogPoisoned);
        }
        let start = backend.size()?;

        if let Err(err) = self.write_group(&mut **backend, txid, sequence, writes) {
            match backend.truncate(start) {
                Ok(()) => debug!(%txid, start, "rolled back partial log group"),
                Err(truncate_err) => {
                    self.poisoned.store(true, Ordering::SeqCst);
                    error!(
                        %txid,
                        start,
                        error = %truncate_err,
                        "log rollback failed, refusing commits until reopen"
                    );
                    let abort = LogRecord::Abort { txid }
                        .encode_frame()
                        .and_then(|frame| Ok(backend.append(&frame)?))
                        .and_then(|_| Ok(backend.flush()?));
                    if let Err(abort_err) = abort {
                        warn!(%txid, error = %abort_err, "abort record not written");
                    }
                }
            }
            return Err(err);
        }
        Ok(start)
    }

    /// Whether a failed rollback has poisoned the log.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    fn write_group(
        &self,
        backend: &mut dyn StorageBackend,
        txid: TransactionId,
        sequence: SequenceNumber,
        writes: &[GroupWrite],
    ) -> CoreResult<()> {
        backend.append(&LogRecord::Begin { txid }.encode_frame()?)?;
        for write in writes {
            let record = LogRecord::Put {
                txid,
                collection: write.collection,
                entity_id: write.entity_id,
                payload: write.payload.clone(),
            };
            backend.append(&record.encode_frame()?)?;
        }
        backend.append(&LogRecord::Commit { txid, sequence }.encode_frame()?)?;

        backend.flush()?;
        if self.sync_on_commit {
            backend.sync()?;
        }
        Ok(())
    }

    /// Replays the log and returns every committed group in commit order.
    ///
    /// A torn tail is dropped from the backend. Groups without `Commit` are
    /// skipped, and so are groups followed by an `Abort`, even one written
    /// after their `Commit`.
    pub(crate) fn recover(&self) -> CoreResult<Vec<CommittedGroup>> {
        let mut backend = self.backend.lock();
        let scan = scan(&**backend)?;

        let size = backend.size()?;
        if scan.valid_len < size {
            warn!(
                valid = scan.valid_len,
                size, "discarding torn write at the end of the log"
            );
            backend.truncate(scan.valid_len)?;
        }
        drop(backend);

        let mut open: HashMap<TransactionId, (u64, Vec<GroupWrite>)> = HashMap::new();
        let mut committed: Vec<CommittedGroup> = Vec::new();

        for (offset, record) in scan.records {
            match record {
                LogRecord::Begin { txid } => {
                    open.insert(txid, (offset, Vec::new()));
                }
                LogRecord::Put {
                    txid,
                    collection,
                    entity_id,
                    payload,
                } => {
                    let (_, group) = open.get_mut(&txid).ok_or_else(|| {
                        CoreError::log_corruption(offset, format!("put for {txid} without begin"))
                    })?;
                    group.push(GroupWrite {
                        collection,
                        entity_id,
                        payload,
                    });
                }
                LogRecord::Commit { txid, sequence } => {
                    let (begin, writes) = open.remove(&txid).ok_or_else(|| {
                        CoreError::log_corruption(
                            offset,
                            format!("commit for {txid} without begin"),
                        )
                    })?;
                    committed.push(CommittedGroup {
                        offset: begin,
                        txid,
                        sequence,
                        writes,
                    });
                }
                LogRecord::Abort { txid } => {
                    if open.remove(&txid).is_none() {
                        if let Some(pos) = committed.iter().rposition(|g| g.txid == txid) {
                            debug!(%txid, "dropping group aborted after its commit record");
                            committed.remove(pos);
                        }
                    }
                }
            }
        }

        for txid in open.keys() {
            debug!(%txid, "ignoring uncommitted log group");
        }
        Ok(committed)
    }

    /// Reads every complete record with its offset.
    ///
    /// Unlike recovery this never modifies the log.
    pub fn read_all(&self) -> CoreResult<Vec<(u64, LogRecord)>> {
        let backend = self.backend.lock();
        Ok(scan(&**backend)?.records)
    }

    /// Flushes pending writes to the operating system.
    pub fn flush(&self) -> CoreResult<()> {
        self.backend.lock().flush()?;
        Ok(())
    }

    /// Makes the log durable.
    pub fn sync(&self) -> CoreResult<()> {
        self.backend.lock().sync()?;
        Ok(())
    }

    /// Returns the current log size in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }
}

fn scan(backend: &dyn StorageBackend) -> CoreResult<Scan> {
    let size = backend.size()?;
    let len = usize::try_from(size)
        .map_err(|_| CoreError::invalid_operation("log too large to scan"))?;
    let bytes = backend.read_at(0, len)?;

    let mut records = Vec::new();
    let mut pos = 0usize;

    while bytes.len() - pos >= HEADER_SIZE {
        let offset = pos as u64;
        let header = &bytes[pos..pos + HEADER_SIZE];

        if header[..4] != LOG_MAGIC {
            return Err(CoreError::log_corruption(offset, "invalid magic"));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != LOG_VERSION {
            return Err(CoreError::log_corruption(
                offset,
                format!("unsupported log version {version}"),
            ));
        }
        let record_type = LogRecordType::from_byte(header[6]).ok_or_else(|| {
            CoreError::log_corruption(offset, format!("unknown record type {}", header[6]))
        })?;
        let payload_len =
            u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;

        let body_end = pos + HEADER_SIZE + payload_len;
        if bytes.len() < body_end + CRC_SIZE {
            break;
        }

        let mut stored = [0u8; CRC_SIZE];
        stored.copy_from_slice(&bytes[body_end..body_end + CRC_SIZE]);
        let expected = u32::from_le_bytes(stored);
        let actual = compute_crc32(&bytes[pos..body_end]);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch {
                offset,
                expected,
                actual,
            });
        }

        let payload = &bytes[pos + HEADER_SIZE..body_end];
        records.push((offset, LogRecord::decode_payload(record_type, payload, offset)?));
        pos = body_end + CRC_SIZE;
    }

    Ok(Scan {
        records,
        valid_len: pos as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gigmarket_storage::{FaultSwitch, FaultyBackend, InMemoryBackend};

    fn write(n: u8) -> GroupWrite {
        GroupWrite {
            collection: Collection::Bids,
            entity_id: EntityId::from_bytes([n; 16]),
            payload: vec![n; 3],
        }
    }

    fn log_over(backend: &InMemoryBackend) -> WriteAheadLog {
        WriteAheadLog::new(Box::new(backend.clone()), false)
    }

    #[test]
    fn committed_groups_replay_in_order() {
        let backend = InMemoryBackend::new();
        let wal = log_over(&backend);
        wal.append_group(TransactionId::new(1), SequenceNumber::new(1), &[write(1)])
            .unwrap();
        wal.append_group(
            TransactionId::new(2),
            SequenceNumber::new(2),
            &[write(2), write(3)],
        )
        .unwrap();

        let groups = log_over(&backend).recover().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].sequence, SequenceNumber::new(1));
        assert_eq!(groups[1].writes, vec![write(2), write(3)]);
    }

    #[test]
    fn failed_rollback_aborts_the_group_and_poisons_the_log() {
        let backend = InMemoryBackend::new();
        let switch = FaultSwitch::new();
        let wal = WriteAheadLog::new(
            Box::new(FaultyBackend::new(backend.clone(), switch.clone())),
            false,
        );
        wal.append_group(TransactionId::new(1), SequenceNumber::new(1), &[write(1)])
            .unwrap();

        // Commit record is written, the flush and the cut back both fail.
        switch.fail_flushes();
        switch.fail_truncates();
        let err = wal
            .append_group(TransactionId::new(2), SequenceNumber::new(2), &[write(2)])
            .unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)), "{err:?}");
        assert!(wal.is_poisoned());

        switch.disarm();
        assert!(matches!(
            wal.append_group(TransactionId::new(3), SequenceNumber::new(2), &[write(3)]),
            Err(CoreError::LogPoisoned)
        ));

        let records = log_over(&backend).read_all().unwrap();
        assert!(matches!(
            records.last(),
            Some((_, LogRecord::Abort { txid })) if *txid == TransactionId::new(2)
        ));

        let reopened = log_over(&backend);
        let groups = reopened.recover().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].txid, TransactionId::new(1));
        assert!(!reopened.is_poisoned());
        reopened
            .append_group(TransactionId::new(3), SequenceNumber::new(2), &[write(3)])
            .unwrap();
        assert_eq!(log_over(&backend).recover().unwrap().len(), 2);
    }

    #[test]
    fn failed_group_leaves_no_bytes() {
        let backend = InMemoryBackend::new();
        let switch = FaultSwitch::new();
        let wal = WriteAheadLog::new(
            Box::new(FaultyBackend::new(backend.clone(), switch.clone())),
            false,
        );
        wal.append_group(TransactionId::new(1), SequenceNumber::new(1), &[write(1)])
            .unwrap();
        let before = backend.snapshot();

        // Begin and the first put succeed, the second put fails.
        switch.fail_after_appends(2);
        let err = wal
            .append_group(
                TransactionId::new(2),
                SequenceNumber::new(2),
                &[write(2), write(3)],
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
        assert_eq!(backend.snapshot(), before);
    }

    #[test]
    fn failed_flush_rolls_back() {
        let backend = InMemoryBackend::new();
        let switch = FaultSwitch::new();
        let wal = WriteAheadLog::new(
            Box::new(FaultyBackend::new(backend.clone(), switch.clone())),
            true,
        );
        switch.fail_flushes();
        assert!(wal
            .append_group(TransactionId::new(1), SequenceNumber::new(1), &[write(1)])
            .is_err());
        assert_eq!(backend.snapshot().len(), 0);
    }

    #[test]
    fn uncommitted_and_aborted_groups_are_skipped() {
        let mut backend = InMemoryBackend::new();
        let txid = TransactionId::new(9);
        for record in [
            LogRecord::Begin { txid },
            LogRecord::Put {
                txid,
                collection: Collection::Gigs,
                entity_id: EntityId::from_bytes([1; 16]),
                payload: vec![1],
            },
            LogRecord::Abort { txid },
            LogRecord::Begin {
                txid: TransactionId::new(10),
            },
        ] {
            backend.append(&record.encode_frame().unwrap()).unwrap();
        }

        let wal = log_over(&backend);
        assert!(wal.recover().unwrap().is_empty());
        assert_eq!(wal.read_all().unwrap().len(), 4);
    }

    #[test]
    fn torn_tail_is_truncated() {
        let backend = InMemoryBackend::new();
        let wal = log_over(&backend);
        wal.append_group(TransactionId::new(1), SequenceNumber::new(1), &[write(1)])
            .unwrap();
        let clean_len = wal.size().unwrap();

        let frame = LogRecord::Begin {
            txid: TransactionId::new(2),
        }
        .encode_frame()
        .unwrap();
        let mut torn = backend.clone();
        torn.append(&frame[..frame.len() - 2]).unwrap();

        let reopened = log_over(&backend);
        assert_eq!(reopened.recover().unwrap().len(), 1);
        assert_eq!(reopened.size().unwrap(), clean_len);
    }

    #[test]
    fn checksum_mismatch_is_fatal() {
        let backend = InMemoryBackend::new();
        log_over(&backend)
            .append_group(TransactionId::new(1), SequenceNumber::new(1), &[write(1)])
            .unwrap();

        let mut bytes = backend.snapshot();
        bytes[HEADER_SIZE + 2] ^= 0xFF;
        let corrupted = InMemoryBackend::with_data(bytes);
        let err = log_over(&corrupted).recover().unwrap_err();
        assert!(matches!(err, CoreError::ChecksumMismatch { offset: 0, .. }));
    }

    #[test]
    fn bad_magic_is_fatal() {
        let mut bytes = LogRecord::Begin {
            txid: TransactionId::new(1),
        }
        .encode_frame()
        .unwrap();
        bytes[0] = b'X';
        let backend = InMemoryBackend::with_data(bytes);
        assert!(matches!(
            log_over(&backend).recover(),
            Err(CoreError::LogCorruption { offset: 0, .. })
        ));
    }

    proptest::proptest! {
        #[test]
        fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(proptest::num::u8::ANY, 0..256)) {
            let backend = InMemoryBackend::with_data(bytes);
            let _ = log_over(&backend).recover();
        }

        #[test]
        fn garbage_after_magic_is_rejected_or_truncated(tail in proptest::collection::vec(proptest::num::u8::ANY, 0..64)) {
            let mut bytes = LOG_MAGIC.to_vec();
            bytes.extend(tail);
            let backend = InMemoryBackend::with_data(bytes);
            if let Ok(groups) = log_over(&backend).recover() {
                proptest::prop_assert!(groups.is_empty());
            }
        }
    }
}
