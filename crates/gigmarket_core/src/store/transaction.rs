//! Optimistic transactions.

use crate::entity::{EntityId, UserId};
use crate::error::CoreResult;
use crate::model::{Bid, Collection, Entity, Gig, GigStatus};
use crate::store::manager::EntityStore;
use crate::types::{SequenceNumber, TransactionId};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Something a transaction read, checked again at commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReadKey {
    /// A single record.
    Entity(Collection, EntityId),
    /// The set of bids on a gig. Changes whenever a bid is inserted for it.
    GigBids(EntityId),
}

impl fmt::Display for ReadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(collection, id) => write!(f, "{collection} {id}"),
            Self::GigBids(gig) => write!(f, "bids of gig {gig}"),
        }
    }
}

/// A condition that must hold on committed state when the transaction commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// The gig exists and has `expected` status.
    GigStatus {
        /// The gig.
        gig: EntityId,
        /// Required status.
        expected: GigStatus,
    },
}

/// Whether a write creates a record or replaces an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// The record must not exist yet.
    Insert,
    /// The record must exist; immutable fields must be unchanged.
    Update,
}

/// A buffered write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingWrite {
    pub kind: WriteKind,
    pub entity: Entity,
}

/// A unit of reads and writes that commits all together or not at all.
///
/// Reads go to committed state and record the version they saw. Writes are
/// buffered until [`Transaction::commit`], which re-validates everything
/// under the store's commit lock. Dropping a transaction discards it.
pub struct Transaction<'s> {
    store: &'s EntityStore,
    id: TransactionId,
    timeout: Duration,
    pub(crate) reads: HashMap<ReadKey, Option<SequenceNumber>>,
    pub(crate) writes: Vec<PendingWrite>,
    pub(crate) preconditions: Vec<Precondition>,
}

impl<'s> Transaction<'s> {
    pub(crate) fn new(store: &'s EntityStore, id: TransactionId, timeout: Duration) -> Self {
        Self {
            store,
            id,
            timeout,
            reads: HashMap::new(),
            writes: Vec::new(),
            preconditions: Vec::new(),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Bound on every lock this transaction waits for.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Loads a gig, seeing this transaction's own writes first.
    pub fn gig(&mut self, id: EntityId) -> CoreResult<Option<Gig>> {
        if let Some(Entity::Gig(gig)) = self.pending(Collection::Gigs, id) {
            return Ok(Some(gig.clone()));
        }
        let found = self
            .store
            .read(self.timeout, |state| state.gig(&id).cloned())?;
        self.record_read(
            ReadKey::Entity(Collection::Gigs, id),
            found.as_ref().map(|v| v.version),
        );
        Ok(found.map(|v| v.value))
    }

    /// Loads a bid, seeing this transaction's own writes first.
    pub fn bid(&mut self, id: EntityId) -> CoreResult<Option<Bid>> {
        if let Some(Entity::Bid(bid)) = self.pending(Collection::Bids, id) {
            return Ok(Some(bid.clone()));
        }
        let found = self
            .store
            .read(self.timeout, |state| state.bid(&id).cloned())?;
        self.record_read(
            ReadKey::Entity(Collection::Bids, id),
            found.as_ref().map(|v| v.version),
        );
        Ok(found.map(|v| v.value))
    }

    /// Loads every committed bid of `gig`, in ID order.
    ///
    /// The bid set itself joins the read set, so a bid inserted for the gig
    /// before this transaction commits makes the commit fail with
    /// `WriteConflict`.
    pub fn bids_for_gig(&mut self, gig: EntityId) -> CoreResult<Vec<Bid>> {
        let (set_version, bids) = self.store.read(self.timeout, |state| {
            let bids: Vec<_> = state
                .bid_ids_for_gig(gig)
                .into_iter()
                .filter_map(|id| state.bid(&id).cloned())
                .collect();
            (state.bid_set_version(gig), bids)
        })?;

        self.record_read(ReadKey::GigBids(gig), set_version);
        for bid in &bids {
            self.record_read(
                ReadKey::Entity(Collection::Bids, bid.value.id),
                Some(bid.version),
            );
        }
        Ok(bids.into_iter().map(|v| v.value).collect())
    }

    /// Looks up the bid of `freelancer` on `gig` in committed state.
    ///
    /// Not added to the read set: the unique `(gig, freelancer)` index
    /// rejects a conflicting insert at commit.
    pub fn bid_for_pair(&mut self, gig: EntityId, freelancer: &UserId) -> CoreResult<Option<Bid>> {
        self.store.read(self.timeout, |state| {
            state.bid_for_pair(gig, freelancer).map(|v| v.value.clone())
        })
    }

    /// Buffers the creation of a record.
    pub fn insert(&mut self, entity: Entity) {
        self.writes.push(PendingWrite {
            kind: WriteKind::Insert,
            entity,
        });
    }

    /// Buffers the replacement of an existing record.
    pub fn update(&mut self, entity: Entity) {
        self.writes.push(PendingWrite {
            kind: WriteKind::Update,
            entity,
        });
    }

    /// Adds a commit-time condition.
    pub fn require(&mut self, precondition: Precondition) {
        self.preconditions.push(precondition);
    }

    /// Number of buffered writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Validates and commits the transaction.
    ///
    /// # Errors
    ///
    /// - `LockTimeout` if the commit lock is not acquired in time
    /// - `PreconditionFailed`, `WriteConflict` or `UniqueViolation` if
    ///   validation fails; nothing is written
    /// - `Storage` if the log write fails; nothing is written
    pub fn commit(self) -> CoreResult<SequenceNumber> {
        let store = self.store;
        store.commit(self)
    }

    fn pending(&self, collection: Collection, id: EntityId) -> Option<&Entity> {
        self.writes
            .iter()
            .rev()
            .map(|w| &w.entity)
            .find(|e| e.collection() == collection && e.entity_id() == id)
    }

    fn record_read(&mut self, key: ReadKey, version: Option<SequenceNumber>) {
        // The first observation is the one validated.
        self.reads.entry(key).or_insert(version);
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("reads", &self.reads.len())
            .field("writes", &self.writes.len())
            .field("preconditions", &self.preconditions)
            .finish()
    }
}
