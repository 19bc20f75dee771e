//! Invariant assertions.
//!
//! [`assert_invariants`] checks the marketplace twice: through
//! [`Marketplace::verify`] and through an independent recount over a
//! [`MarketSnapshot`] taken with the public query operations.

use gigmarket_core::{Bid, BidStatus, EntityId, Gig, GigFilter, GigStatus, Marketplace, UserId};
use std::collections::{BTreeMap, HashSet};

/// Every gig and bid, sorted by ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSnapshot {
    /// All gigs.
    pub gigs: Vec<Gig>,
    /// All bids.
    pub bids: Vec<Bid>,
}

impl MarketSnapshot {
    /// Reads the committed state of `market`.
    pub fn capture(market: &Marketplace) -> Self {
        let mut gigs = market
            .list_gigs(&GigFilter::new())
            .expect("Failed to list gigs");
        gigs.sort_by_key(|g| g.id);

        let mut bids = Vec::new();
        for gig in &gigs {
            bids.extend(
                market
                    .list_bids_for_gig(gig.id, &gig.owner)
                    .expect("Failed to list bids"),
            );
        }
        bids.sort_by_key(|b| b.id);

        Self { gigs, bids }
    }

    /// Looks up a gig.
    pub fn gig(&self, id: EntityId) -> Option<&Gig> {
        self.gigs.iter().find(|g| g.id == id)
    }

    /// Looks up a bid.
    pub fn bid(&self, id: EntityId) -> Option<&Bid> {
        self.bids.iter().find(|b| b.id == id)
    }

    /// Bids of one gig.
    pub fn bids_for(&self, gig: EntityId) -> impl Iterator<Item = &Bid> {
        self.bids.iter().filter(move |b| b.gig == gig)
    }

    /// Bids of one gig with status `status`.
    pub fn count_with_status(&self, gig: EntityId, status: BidStatus) -> usize {
        self.bids_for(gig).filter(|b| b.status == status).count()
    }

    /// Describes every broken invariant. Empty when the snapshot is sound.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for gig in &self.gigs {
            let hired: Vec<&Bid> = self
                .bids_for(gig.id)
                .filter(|b| b.status == BidStatus::Hired)
                .collect();
            let assigned = gig.status == GigStatus::Assigned;

            if assigned != gig.assigned_to.is_some() {
                problems.push(format!(
                    "gig {}: status {} with assigned_to {:?}",
                    gig.id, gig.status, gig.assigned_to
                ));
            }
            if assigned != (hired.len() == 1) {
                problems.push(format!(
                    "gig {}: status {} with {} hired bid(s)",
                    gig.id,
                    gig.status,
                    hired.len()
                ));
            }
            if let [winner] = hired.as_slice() {
                if gig.assigned_to.as_ref() != Some(&winner.freelancer) {
                    problems.push(format!(
                        "gig {}: assigned to {:?} but {} was hired",
                        gig.id, gig.assigned_to, winner.freelancer
                    ));
                }
            }
            if !assigned {
                if let Some(settled) = self.bids_for(gig.id).find(|b| !b.is_pending()) {
                    problems.push(format!(
                        "gig {}: open with {} bid {}",
                        gig.id, settled.status, settled.id
                    ));
                }
            }
        }

        let mut pairs: BTreeMap<(EntityId, &UserId), usize> = BTreeMap::new();
        for bid in &self.bids {
            *pairs.entry((bid.gig, &bid.freelancer)).or_default() += 1;
        }
        for ((gig, freelancer), count) in pairs {
            if count > 1 {
                problems.push(format!("gig {gig}: {count} bids from {freelancer}"));
            }
        }

        let ids: HashSet<EntityId> = self.bids.iter().map(|b| b.id).collect();
        if ids.len() != self.bids.len() {
            problems.push("a bid is listed under more than one gig".to_string());
        }

        problems
    }
}

/// Asserts that every marketplace invariant holds.
///
/// # Panics
///
/// When [`Marketplace::verify`] reports a violation, or the independent
/// recount over a snapshot finds a problem.
pub fn assert_invariants(market: &Marketplace) {
    let report = market.verify().expect("Failed to verify market");
    assert!(
        report.is_clean(),
        "integrity violations: {:#?}",
        report.violations
    );

    let snapshot = MarketSnapshot::capture(market);
    assert_eq!(report.gigs_checked, snapshot.gigs.len());
    assert_eq!(report.bids_checked, snapshot.bids.len());
    let problems = snapshot.problems();
    assert!(problems.is_empty(), "invariant problems: {problems:#?}");
}

/// Asserts that the committed state equals `before`.
pub fn assert_unchanged(market: &Marketplace, before: &MarketSnapshot) {
    let after = MarketSnapshot::capture(market);
    assert_eq!(&after, before, "market state changed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{seed_gig_with_bids, TestMarket};

    #[test]
    fn test_snapshot_captures_all_bids() {
        let market = TestMarket::memory();
        let first = seed_gig_with_bids(&market, 2);
        let second = seed_gig_with_bids(&market, 3);

        let snapshot = MarketSnapshot::capture(&market);
        assert_eq!(snapshot.gigs.len(), 2);
        assert_eq!(snapshot.bids.len(), 5);
        assert_eq!(snapshot.bids_for(first.gig.id).count(), 2);
        assert_eq!(
            snapshot.count_with_status(second.gig.id, BidStatus::Pending),
            3
        );
        assert!(snapshot.problems().is_empty());
    }

    #[test]
    fn test_problems_detects_half_assigned_gig() {
        let market = TestMarket::memory();
        let scenario = seed_gig_with_bids(&market, 1);
        let mut snapshot = MarketSnapshot::capture(&market);
        snapshot.gigs[0].status = GigStatus::Assigned;

        let problems = snapshot.problems();
        assert_eq!(problems.len(), 2, "{problems:?}");
        assert!(problems[0].contains(&scenario.gig.id.to_string()));
    }

    #[test]
    fn test_problems_detects_hired_bid_on_open_gig() {
        let market = TestMarket::memory();
        seed_gig_with_bids(&market, 2);
        let mut snapshot = MarketSnapshot::capture(&market);
        snapshot.bids[0].status = BidStatus::Hired;

        assert!(!snapshot.problems().is_empty());
    }

    #[test]
    fn test_assert_invariants_after_hire() {
        let market = TestMarket::memory();
        let scenario = seed_gig_with_bids(&market, 3);
        market.hire(scenario.bids[1].id, &scenario.owner).unwrap();
        assert_invariants(&market);
    }
}
