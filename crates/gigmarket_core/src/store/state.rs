//! Committed in-memory state.

use crate::entity::{EntityId, UserId};
use crate::error::{CoreError, CoreResult};
use crate::model::{Bid, Collection, Entity, Gig};
use crate::store::index::{MultiIndex, UniqueIndex};
use crate::store::transaction::{PendingWrite, Precondition, ReadKey, WriteKind};
use crate::types::SequenceNumber;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// A record plus the commits that created and last wrote it.
#[derive(Debug, Clone)]
pub(crate) struct Versioned<T> {
    pub value: T,
    /// Sequence of the last commit that wrote the record.
    pub version: SequenceNumber,
    /// Sequence of the commit that inserted the record.
    pub created: SequenceNumber,
}

/// Everything committed so far.
///
/// Only mutated by [`StoreState::apply`], which runs after validation and a
/// durable log write.
#[derive(Debug)]
pub(crate) struct StoreState {
    gigs: HashMap<EntityId, Versioned<Gig>>,
    bids: HashMap<EntityId, Versioned<Bid>>,
    bid_pairs: UniqueIndex<(EntityId, UserId)>,
    bids_by_gig: MultiIndex<EntityId>,
    bids_by_freelancer: MultiIndex<UserId>,
    bid_set_versions: HashMap<EntityId, SequenceNumber>,
    committed_seq: SequenceNumber,
}

impl StoreState {
    pub(crate) fn new() -> Self {
        Self {
            gigs: HashMap::new(),
            bids: HashMap::new(),
            bid_pairs: UniqueIndex::new("bid_gig_freelancer"),
            bids_by_gig: MultiIndex::new(),
            bids_by_freelancer: MultiIndex::new(),
            bid_set_versions: HashMap::new(),
            committed_seq: SequenceNumber::default(),
        }
    }

    pub(crate) fn committed_seq(&self) -> SequenceNumber {
        self.committed_seq
    }

    pub(crate) fn gig(&self, id: &EntityId) -> Option<&Versioned<Gig>> {
        self.gigs.get(id)
    }

    pub(crate) fn bid(&self, id: &EntityId) -> Option<&Versioned<Bid>> {
        self.bids.get(id)
    }

    pub(crate) fn gigs(&self) -> impl Iterator<Item = &Versioned<Gig>> {
        self.gigs.values()
    }

    pub(crate) fn bids(&self) -> impl Iterator<Item = &Versioned<Bid>> {
        self.bids.values()
    }

    pub(crate) fn gig_count(&self) -> usize {
        self.gigs.len()
    }

    pub(crate) fn bid_count(&self) -> usize {
        self.bids.len()
    }

    pub(crate) fn bid_for_pair(
        &self,
        gig: EntityId,
        freelancer: &UserId,
    ) -> Option<&Versioned<Bid>> {
        self.bid_pairs
            .get(&(gig, freelancer.clone()))
            .and_then(|id| self.bids.get(&id))
    }

    pub(crate) fn bid_ids_for_gig(&self, gig: EntityId) -> Vec<EntityId> {
        self.bids_by_gig.lookup(&gig)
    }

    pub(crate) fn bid_ids_for_freelancer(&self, freelancer: &UserId) -> Vec<EntityId> {
        self.bids_by_freelancer.lookup(freelancer)
    }

    pub(crate) fn bid_set_version(&self, gig: EntityId) -> Option<SequenceNumber> {
        self.bid_set_versions.get(&gig).copied()
    }

    fn version_of(&self, key: &ReadKey) -> Option<SequenceNumber> {
        match key {
            ReadKey::Entity(Collection::Gigs, id) => self.gigs.get(id).map(|v| v.version),
            ReadKey::Entity(Collection::Bids, id) => self.bids.get(id).map(|v| v.version),
            ReadKey::GigBids(gig) => self.bid_set_version(*gig),
        }
    }

    fn contains(&self, collection: Collection, id: EntityId) -> bool {
        match collection {
            Collection::Gigs => self.gigs.contains_key(&id),
            Collection::Bids => self.bids.contains_key(&id),
        }
    }

    pub(crate) fn check_preconditions(&self, preconditions: &[Precondition]) -> CoreResult<()> {
        for precondition in preconditions {
            match *precondition {
                Precondition::GigStatus { gig, expected } => {
                    let actual = self.gigs.get(&gig).map(|v| v.value.status);
                    if actual != Some(expected) {
                        return Err(CoreError::PreconditionFailed {
                            gig,
                            expected,
                            actual,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn check_reads(
        &self,
        reads: &HashMap<ReadKey, Option<SequenceNumber>>,
    ) -> CoreResult<()> {
        for (key, observed) in reads {
            if self.version_of(key) != *observed {
                return Err(CoreError::WriteConflict {
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Checks that `writes` can be applied on top of the current state.
    pub(crate) fn check_writes(&self, writes: &[PendingWrite]) -> CoreResult<()> {
        let mut inserted: HashSet<(Collection, EntityId)> = HashSet::new();
        let mut pairs: HashSet<(EntityId, UserId)> = HashSet::new();

        for write in writes {
            let collection = write.entity.collection();
            let id = write.entity.entity_id();

            match (write.kind, &write.entity) {
                (WriteKind::Insert, entity) => {
                    if self.contains(collection, id) || !inserted.insert((collection, id)) {
                        return Err(CoreError::invalid_operation(format!(
                            "{collection} {id} already exists"
                        )));
                    }
                    if let Entity::Bid(bid) = entity {
                        if !self.gigs.contains_key(&bid.gig)
                            && !inserted.contains(&(Collection::Gigs, bid.gig))
                        {
                            return Err(CoreError::invalid_operation(format!(
                                "bid {id} references missing gig {}",
                                bid.gig
                            )));
                        }
                        let key = (bid.gig, bid.freelancer.clone());
                        self.bid_pairs.check(&key, bid.id)?;
                        if !pairs.insert(key.clone()) {
                            return Err(CoreError::UniqueViolation {
                                index: self.bid_pairs.name(),
                                key: format!("{key:?}"),
                            });
                        }
                    }
                }
                (WriteKind::Update, Entity::Gig(gig)) => {
                    let current = self.gigs.get(&id).ok_or_else(|| {
                        CoreError::invalid_operation(format!("gig {id} does not exist"))
                    })?;
                    if current.value.owner != gig.owner {
                        return Err(CoreError::invalid_operation(format!(
                            "owner of gig {id} cannot change"
                        )));
                    }
                }
                (WriteKind::Update, Entity::Bid(bid)) => {
                    let current = self.bids.get(&id).ok_or_else(|| {
                        CoreError::invalid_operation(format!("bid {id} does not exist"))
                    })?;
                    if current.value.gig != bid.gig || current.value.freelancer != bid.freelancer {
                        return Err(CoreError::invalid_operation(format!(
                            "gig and freelancer of bid {id} cannot change"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Applies a validated group as commit `sequence`.
    pub(crate) fn apply(&mut self, sequence: SequenceNumber, writes: Vec<PendingWrite>) {
        for write in writes {
            match write.entity {
                Entity::Gig(gig) => match self.gigs.entry(gig.id) {
                    Entry::Occupied(mut slot) => {
                        let current = slot.get_mut();
                        current.value = gig;
                        current.version = sequence;
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(Versioned {
                            value: gig,
                            version: sequence,
                            created: sequence,
                        });
                    }
                },
                Entity::Bid(bid) => match self.bids.entry(bid.id) {
                    Entry::Occupied(mut slot) => {
                        let current = slot.get_mut();
                        current.value = bid;
                        current.version = sequence;
                    }
                    Entry::Vacant(slot) => {
                        self.bid_pairs.insert((bid.gig, bid.freelancer.clone()), bid.id);
                        self.bids_by_gig.insert(bid.gig, bid.id);
                        self.bids_by_freelancer.insert(bid.freelancer.clone(), bid.id);
                        self.bid_set_versions.insert(bid.gig, sequence);
                        slot.insert(Versioned {
                            value: bid,
                            version: sequence,
                            created: sequence,
                        });
                    }
                },
            }
        }
        self.committed_seq = sequence;
    }

    /// Replays a logged group, classifying each image as insert or update.
    pub(crate) fn replay(
        &mut self,
        offset: u64,
        sequence: SequenceNumber,
        entities: Vec<Entity>,
    ) -> CoreResult<()> {
        if sequence <= self.committed_seq {
            return Err(CoreError::log_corruption(
                offset,
                format!("{sequence} does not follow {}", self.committed_seq),
            ));
        }

        let writes: Vec<PendingWrite> = entities
            .into_iter()
            .map(|entity| {
                let kind = if self.contains(entity.collection(), entity.entity_id()) {
                    WriteKind::Update
                } else {
                    WriteKind::Insert
                };
                PendingWrite { kind, entity }
            })
            .collect();

        self.check_writes(&writes)
            .map_err(|e| CoreError::log_corruption(offset, e.to_string()))?;
        self.apply(sequence, writes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GigStatus, NewGig};

    fn gig(owner: &str) -> Gig {
        Gig::new(UserId::new(owner), NewGig::new("Logo", "Vector logo", 100))
    }

    fn insert(entity: Entity) -> PendingWrite {
        PendingWrite {
            kind: WriteKind::Insert,
            entity,
        }
    }

    fn update(entity: Entity) -> PendingWrite {
        PendingWrite {
            kind: WriteKind::Update,
            entity,
        }
    }

    #[test]
    fn apply_tracks_versions_and_indexes() {
        let mut state = StoreState::new();
        let g = gig("client");
        state.apply(SequenceNumber::new(1), vec![insert(Entity::Gig(g.clone()))]);

        let bid = Bid::new(g.id, UserId::new("ada"), "hi", 10);
        state.apply(SequenceNumber::new(2), vec![insert(Entity::Bid(bid.clone()))]);

        let mut hired = bid.clone();
        hired.status = crate::model::BidStatus::Hired;
        state.apply(SequenceNumber::new(3), vec![update(Entity::Bid(hired))]);

        let stored = state.bid(&bid.id).unwrap();
        assert_eq!(stored.created, SequenceNumber::new(2));
        assert_eq!(stored.version, SequenceNumber::new(3));
        assert_eq!(state.bid_ids_for_gig(g.id), vec![bid.id]);
        assert_eq!(state.bid_ids_for_freelancer(&UserId::new("ada")), vec![bid.id]);
        assert_eq!(state.bid_set_version(g.id), Some(SequenceNumber::new(2)));
        assert_eq!(state.committed_seq(), SequenceNumber::new(3));
    }

    #[test]
    fn duplicate_pair_in_one_group_is_rejected() {
        let mut state = StoreState::new();
        let g = gig("client");
        state.apply(SequenceNumber::new(1), vec![insert(Entity::Gig(g.clone()))]);

        let a = Bid::new(g.id, UserId::new("ada"), "one", 10);
        let b = Bid::new(g.id, UserId::new("ada"), "two", 20);
        let err = state
            .check_writes(&[insert(Entity::Bid(a)), insert(Entity::Bid(b))])
            .unwrap_err();
        assert!(matches!(err, CoreError::UniqueViolation { .. }));
    }

    #[test]
    fn immutable_fields_are_enforced() {
        let mut state = StoreState::new();
        let g = gig("client");
        state.apply(SequenceNumber::new(1), vec![insert(Entity::Gig(g.clone()))]);

        let mut stolen = g.clone();
        stolen.owner = UserId::new("mallory");
        assert!(state.check_writes(&[update(Entity::Gig(stolen))]).is_err());
        assert!(state.check_writes(&[insert(Entity::Gig(g))]).is_err());
    }

    #[test]
    fn bid_for_unknown_gig_is_rejected() {
        let state = StoreState::new();
        let orphan = Bid::new(EntityId::new(), UserId::new("ada"), "hi", 10);
        assert!(state.check_writes(&[insert(Entity::Bid(orphan))]).is_err());
    }

    #[test]
    fn precondition_reports_actual_status() {
        let mut state = StoreState::new();
        let mut g = gig("client");
        g.assign(UserId::new("ada"));
        state.apply(SequenceNumber::new(1), vec![insert(Entity::Gig(g.clone()))]);

        let err = state
            .check_preconditions(&[Precondition::GigStatus {
                gig: g.id,
                expected: GigStatus::Open,
            }])
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::PreconditionFailed {
                actual: Some(GigStatus::Assigned),
                ..
            }
        ));
    }

    #[test]
    fn stale_read_is_a_conflict() {
        let mut state = StoreState::new();
        let g = gig("client");
        state.apply(SequenceNumber::new(1), vec![insert(Entity::Gig(g.clone()))]);

        let mut reads = HashMap::new();
        reads.insert(ReadKey::GigBids(g.id), None);
        state.check_reads(&reads).unwrap();

        let bid = Bid::new(g.id, UserId::new("ada"), "hi", 10);
        state.apply(SequenceNumber::new(2), vec![insert(Entity::Bid(bid))]);
        assert!(matches!(
            state.check_reads(&reads),
            Err(CoreError::WriteConflict { .. })
        ));
    }

    #[test]
    fn replay_rejects_out_of_order_sequence() {
        let mut state = StoreState::new();
        state
            .replay(0, SequenceNumber::new(2), vec![Entity::Gig(gig("a"))])
            .unwrap();
        let err = state
            .replay(64, SequenceNumber::new(2), vec![Entity::Gig(gig("b"))])
            .unwrap_err();
        assert!(matches!(err, CoreError::LogCorruption { offset: 64, .. }));
    }
}
