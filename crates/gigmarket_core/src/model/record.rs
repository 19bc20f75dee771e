//! Record encoding and the collections records live in.

use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use crate::model::{Bid, Gig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// The collections of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Collection {
    /// Gig records.
    Gigs = 1,
    /// Bid records.
    Bids = 2,
}

impl Collection {
    /// Converts a log byte back into a collection.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Gigs),
            2 => Some(Self::Bids),
            _ => None,
        }
    }

    /// The byte written to the log.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gigs => "gig",
            Self::Bids => "bid",
        })
    }
}

/// A type stored as CBOR in one collection.
pub trait Record: Serialize + DeserializeOwned + Clone {
    /// The collection holding records of this type.
    const COLLECTION: Collection;

    /// The record's immutable ID.
    fn entity_id(&self) -> EntityId;

    /// Encodes the record as CBOR.
    fn encode(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|e| CoreError::encode(format!("{}: {e}", Self::COLLECTION)))?;
        Ok(buf)
    }

    /// Decodes a record from CBOR.
    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        ciborium::de::from_reader(bytes)
            .map_err(|e| CoreError::decode(format!("{}: {e}", Self::COLLECTION)))
    }
}

/// A record of either collection, as carried by transactions and the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    /// A gig.
    Gig(Gig),
    /// A bid.
    Bid(Bid),
}

impl Entity {
    /// The collection the record belongs to.
    #[must_use]
    pub fn collection(&self) -> Collection {
        match self {
            Self::Gig(_) => Collection::Gigs,
            Self::Bid(_) => Collection::Bids,
        }
    }

    /// The record's ID.
    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        match self {
            Self::Gig(gig) => gig.entity_id(),
            Self::Bid(bid) => bid.entity_id(),
        }
    }

    /// Encodes the wrapped record.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        match self {
            Self::Gig(gig) => gig.encode(),
            Self::Bid(bid) => bid.encode(),
        }
    }

    /// Decodes a record of `collection`.
    pub fn decode(collection: Collection, bytes: &[u8]) -> CoreResult<Self> {
        match collection {
            Collection::Gigs => Gig::decode(bytes).map(Self::Gig),
            Collection::Bids => Bid::decode(bytes).map(Self::Bid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::UserId;
    use crate::model::NewGig;

    #[test]
    fn collection_bytes() {
        for c in [Collection::Gigs, Collection::Bids] {
            assert_eq!(Collection::from_byte(c.as_byte()), Some(c));
        }
        assert_eq!(Collection::from_byte(0), None);
    }

    #[test]
    fn entity_decodes_by_collection() {
        let gig = Gig::new(UserId::new("client"), NewGig::new("Logo", "A logo", 100));
        let bytes = Entity::Gig(gig.clone()).encode().unwrap();
        assert_eq!(
            Entity::decode(Collection::Gigs, &bytes).unwrap(),
            Entity::Gig(gig)
        );
        assert!(matches!(
            Entity::decode(Collection::Bids, &bytes),
            Err(CoreError::Decode { .. })
        ));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(Gig::decode(&[0xff, 0x00, 0x13]).is_err());
    }
}
