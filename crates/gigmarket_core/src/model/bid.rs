//! Bid records.

use crate::entity::{EntityId, UserId};
use crate::model::record::{Collection, Record};
use crate::types::now_millis;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a bid.
///
/// `Pending` is initial; `Hired` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidStatus {
    /// Waiting for the gig owner's decision.
    Pending,
    /// Chosen by the gig owner.
    Hired,
    /// Another bid was hired.
    Rejected,
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Hired => "hired",
            Self::Rejected => "rejected",
        })
    }
}

/// A freelancer's proposal against one gig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    /// Bid ID.
    pub id: EntityId,
    /// The gig bid on. Never changes.
    pub gig: EntityId,
    /// The bidder. Never changes.
    pub freelancer: UserId,
    /// Proposal text.
    pub message: String,
    /// Asking price in minor currency units.
    pub price: u64,
    /// Current status.
    pub status: BidStatus,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: u64,
}

impl Bid {
    /// Creates a pending bid.
    pub fn new(gig: EntityId, freelancer: UserId, message: impl Into<String>, price: u64) -> Self {
        Self {
            id: EntityId::new(),
            gig,
            freelancer,
            message: message.into(),
            price,
            status: BidStatus::Pending,
            created_at: now_millis(),
        }
    }

    /// Whether the bid is still awaiting a decision.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == BidStatus::Pending
    }
}

impl Record for Bid {
    const COLLECTION: Collection = Collection::Bids;

    fn entity_id(&self) -> EntityId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_bid_is_pending() {
        let bid = Bid::new(EntityId::new(), UserId::new("ada"), "hello", 10);
        assert!(bid.is_pending());
        assert_eq!(bid.status.to_string(), "pending");
    }

    #[test]
    fn status_survives_encoding() {
        assert_eq!(BidStatus::Rejected.to_string(), "rejected");
        let mut bid = Bid::new(EntityId::new(), UserId::new("ada"), "hello", 10);
        bid.status = BidStatus::Hired;
        assert_eq!(Bid::decode(&bid.encode().unwrap()).unwrap().status, BidStatus::Hired);
    }
}
