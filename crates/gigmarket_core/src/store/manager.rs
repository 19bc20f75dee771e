//! The entity store.

use crate::error::{CoreError, CoreResult};
use crate::model::Entity;
use crate::store::state::StoreState;
use crate::store::transaction::Transaction;
use crate::types::{SequenceNumber, TransactionId};
use crate::wal::{GroupWrite, WriteAheadLog};
use gigmarket_storage::StorageBackend;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Durable keyed storage for gigs and bids.
///
/// ## Concurrency
///
/// Transactions run optimistically: reads take a short read lock on the
/// committed state, writes are buffered. [`Transaction::commit`] takes the
/// single commit lock and, while holding it:
///
/// 1. checks preconditions (`PreconditionFailed`)
/// 2. checks every recorded read is still current (`WriteConflict`)
/// 3. checks inserts against the unique indexes (`UniqueViolation`)
/// 4. appends the group to the log and flushes it
/// 5. applies the group to the committed state
///
/// A failure in steps 1-4 leaves both the log and the state untouched. If
/// the log cannot be cut back after a failed append, the group is aborted in
/// the log and later commits fail with [`CoreError::LogPoisoned`] until the
/// store is reopened.
pub struct EntityStore {
    wal: WriteAheadLog,
    state: RwLock<StoreState>,
    /// Serializes commits.
    commit_lock: Mutex<()>,
    next_txid: AtomicU64,
    closed: AtomicBool,
}

impl EntityStore {
    /// Opens a store over `backend`, replaying its log.
    ///
    /// # Errors
    ///
    /// Fails if the log is corrupt (bad magic, checksum mismatch, a group
    /// that does not apply cleanly). A torn tail is repaired instead.
    pub fn open(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> CoreResult<Self> {
        let wal = WriteAheadLog::new(backend, sync_on_commit);
        let mut state = StoreState::new();
        let mut max_txid = 0u64;

        let groups = wal.recover()?;
        let replayed = groups.len();
        for group in groups {
            max_txid = max_txid.max(group.txid.as_u64());
            let entities = group
                .writes
                .into_iter()
                .map(|w| Entity::decode(w.collection, &w.payload))
                .collect::<CoreResult<Vec<_>>>()
                .map_err(|e| CoreError::log_corruption(group.offset, e.to_string()))?;
            state.replay(group.offset, group.sequence, entities)?;
        }

        debug!(
            groups = replayed,
            committed = %state.committed_seq(),
            "entity store recovered"
        );

        Ok(Self {
            wal,
            state: RwLock::new(state),
            commit_lock: Mutex::new(()),
            next_txid: AtomicU64::new(max_txid + 1),
            closed: AtomicBool::new(false),
        })
    }

    /// Starts a transaction whose lock waits are bounded by `timeout`.
    pub fn begin(&self, timeout: Duration) -> CoreResult<Transaction<'_>> {
        self.ensure_open()?;
        let txid = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        Ok(Transaction::new(self, txid, timeout))
    }

    /// Runs `f` against the committed state under a read lock.
    pub(crate) fn read<R>(
        &self,
        timeout: Duration,
        f: impl FnOnce(&StoreState) -> R,
    ) -> CoreResult<R> {
        self.ensure_open()?;
        let state = self
            .state
            .try_read_for(timeout)
            .ok_or(CoreError::LockTimeout { timeout })?;
        Ok(f(&state))
    }

    pub(crate) fn commit(&self, txn: Transaction<'_>) -> CoreResult<SequenceNumber> {
        self.ensure_open()?;
        let timeout = txn.timeout();
        let txid = txn.id();

        if txn.writes.is_empty() {
            // Read-only: validating against current state is enough.
            let state = self
                .state
                .try_read_for(timeout)
                .ok_or(CoreError::LockTimeout { timeout })?;
            state.check_preconditions(&txn.preconditions)?;
            state.check_reads(&txn.reads)?;
            return Ok(state.committed_seq());
        }

        let _commit_guard = self
            .commit_lock
            .try_lock_for(timeout)
            .ok_or(CoreError::LockTimeout { timeout })?;

        // Only committers mutate the state and they hold the commit lock, so
        // what is validated here is what the group is applied to.
        let (sequence, group) = {
            let state = self
                .state
                .try_read_for(timeout)
                .ok_or(CoreError::LockTimeout { timeout })?;
            state.check_preconditions(&txn.preconditions)?;
            state.check_reads(&txn.reads)?;
            state.check_writes(&txn.writes)?;

            let group = txn
                .writes
                .iter()
                .map(|w| {
                    Ok(GroupWrite {
                        collection: w.entity.collection(),
                        entity_id: w.entity.entity_id(),
                        payload: w.entity.encode()?,
                    })
                })
                .collect::<CoreResult<Vec<_>>>()?;
            (state.committed_seq().next(), group)
        };

        self.wal.append_group(txid, sequence, &group)?;

        let writes = txn.writes.len();
        self.state.write().apply(sequence, txn.writes);
        debug!(%txid, %sequence, writes, "committed");
        Ok(sequence)
    }

    /// Sequence of the latest commit.
    pub fn committed_seq(&self) -> SequenceNumber {
        self.state.read().committed_seq()
    }

    /// The underlying write-ahead log.
    pub fn log(&self) -> &WriteAheadLog {
        &self.wal
    }

    /// Flushes the log and rejects every later operation with `StoreClosed`.
    pub fn close(&self) -> CoreResult<()> {
        let _commit_guard = self.commit_lock.lock();
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.wal.flush()
    }

    /// Whether [`EntityStore::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_closed() {
            return Err(CoreError::StoreClosed);
        }
        Ok(())
    }
}
