//! Invariant verification.
//!
//! For every gig: `status == ASSIGNED` iff `assigned_to` is set iff exactly
//! one of its bids is HIRED, and that bid belongs to `assigned_to`. While a
//! gig is OPEN all of its bids are PENDING. At most one bid exists per
//! `(gig, freelancer)` and every bid references an existing gig.

use crate::entity::{EntityId, UserId};
use crate::error::MarketResult;
use crate::market::OpContext;
use crate::model::{Bid, BidStatus, GigStatus};
use crate::store::StoreState;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::error;

/// One broken invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// `status` and `assigned_to` disagree.
    InconsistentAssignment {
        /// The gig.
        gig: EntityId,
        /// Its status.
        status: GigStatus,
        /// Its assignee.
        assigned_to: Option<UserId>,
    },
    /// An assigned gig has no hired bid.
    AssignedWithoutHiredBid {
        /// The gig.
        gig: EntityId,
    },
    /// More than one bid of a gig is hired.
    MultipleHiredBids {
        /// The gig.
        gig: EntityId,
        /// The hired bids.
        bids: Vec<EntityId>,
    },
    /// The hired bid's freelancer is not the gig's assignee.
    AssigneeMismatch {
        /// The gig.
        gig: EntityId,
        /// The hired bid.
        bid: EntityId,
        /// The gig's assignee.
        assigned_to: Option<UserId>,
        /// The bid's freelancer.
        freelancer: UserId,
    },
    /// A bid of an open gig is hired or rejected.
    SettledBidOnOpenGig {
        /// The gig.
        gig: EntityId,
        /// The bid.
        bid: EntityId,
        /// Its status.
        status: BidStatus,
    },
    /// A freelancer has more than one bid on a gig.
    DuplicatePair {
        /// The gig.
        gig: EntityId,
        /// The freelancer.
        freelancer: UserId,
        /// The bids.
        bids: Vec<EntityId>,
    },
    /// A bid references a gig that does not exist.
    OrphanBid {
        /// The bid.
        bid: EntityId,
        /// The missing gig.
        gig: EntityId,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InconsistentAssignment {
                gig,
                status,
                assigned_to,
            } => write!(f, "gig {gig} is {status} but assigned_to is {assigned_to:?}"),
            Self::AssignedWithoutHiredBid { gig } => {
                write!(f, "gig {gig} is assigned but has no hired bid")
            }
            Self::MultipleHiredBids { gig, bids } => {
                write!(f, "gig {gig} has {} hired bids", bids.len())
            }
            Self::AssigneeMismatch {
                gig,
                bid,
                assigned_to,
                freelancer,
            } => write!(
                f,
                "gig {gig} is assigned to {assigned_to:?} but hired bid {bid} belongs to {freelancer}"
            ),
            Self::SettledBidOnOpenGig { gig, bid, status } => {
                write!(f, "bid {bid} is {status} while gig {gig} is open")
            }
            Self::DuplicatePair {
                gig,
                freelancer,
                bids,
            } => write!(f, "{freelancer} has {} bids on gig {gig}", bids.len()),
            Self::OrphanBid { bid, gig } => write!(f, "bid {bid} references missing gig {gig}"),
        }
    }
}

/// Result of [`crate::Marketplace::verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// Number of gigs scanned.
    pub gigs_checked: usize,
    /// Number of bids scanned.
    pub bids_checked: usize,
    /// Everything found wrong.
    pub violations: Vec<Violation>,
}

impl IntegrityReport {
    /// Whether no invariant is broken.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

pub(crate) fn verify(ctx: &OpContext<'_>) -> MarketResult<IntegrityReport> {
    let report = ctx.store.read(ctx.timeout, check_state)?;
    for violation in &report.violations {
        error!(%violation, "integrity check failed");
    }
    Ok(report)
}

fn check_state(state: &StoreState) -> IntegrityReport {
    let mut report = IntegrityReport {
        gigs_checked: state.gig_count(),
        bids_checked: state.bid_count(),
        violations: Vec::new(),
    };

    // Ordered maps keep the report stable between runs.
    let mut by_gig: BTreeMap<EntityId, Vec<&Bid>> = BTreeMap::new();
    let mut pairs: HashMap<(EntityId, &UserId), Vec<EntityId>> = HashMap::new();
    let mut bids: Vec<&Bid> = state.bids().map(|v| &v.value).collect();
    bids.sort_by_key(|b| b.id);

    for bid in bids {
        pairs.entry((bid.gig, &bid.freelancer)).or_default().push(bid.id);
        if state.gig(&bid.gig).is_none() {
            report.violations.push(Violation::OrphanBid {
                bid: bid.id,
                gig: bid.gig,
            });
        }
        by_gig.entry(bid.gig).or_default().push(bid);
    }

    let mut gigs: Vec<_> = state.gigs().map(|v| &v.value).collect();
    gigs.sort_by_key(|g| g.id);

    for gig in gigs {
        if !gig.is_consistent() {
            report.violations.push(Violation::InconsistentAssignment {
                gig: gig.id,
                status: gig.status,
                assigned_to: gig.assigned_to.clone(),
            });
        }

        let siblings = by_gig.get(&gig.id).map(Vec::as_slice).unwrap_or_default();
        let hired: Vec<&Bid> = siblings
            .iter()
            .copied()
            .filter(|b| b.status == BidStatus::Hired)
            .collect();

        match gig.status {
            GigStatus::Open => {
                for bid in siblings.iter().filter(|b| !b.is_pending()) {
                    report.violations.push(Violation::SettledBidOnOpenGig {
                        gig: gig.id,
                        bid: bid.id,
                        status: bid.status,
                    });
                }
            }
            GigStatus::Assigned => match hired.as_slice() {
                [] => report
                    .violations
                    .push(Violation::AssignedWithoutHiredBid { gig: gig.id }),
                [bid] => {
                    if gig.assigned_to.as_ref() != Some(&bid.freelancer) {
                        report.violations.push(Violation::AssigneeMismatch {
                            gig: gig.id,
                            bid: bid.id,
                            assigned_to: gig.assigned_to.clone(),
                            freelancer: bid.freelancer.clone(),
                        });
                    }
                }
                many => report.violations.push(Violation::MultipleHiredBids {
                    gig: gig.id,
                    bids: many.iter().map(|b| b.id).collect(),
                }),
            },
        }
    }

    let mut duplicates: Vec<_> = pairs
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .collect();
    duplicates.sort_by(|a, b| a.0.cmp(&b.0));
    for ((gig, freelancer), bids) in duplicates {
        report.violations.push(Violation::DuplicatePair {
            gig,
            freelancer: freelancer.clone(),
            bids,
        });
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entity, Gig, NewGig};
    use crate::store::{PendingWrite, WriteKind};
    use crate::types::SequenceNumber;

    fn state_with(entities: Vec<Entity>) -> StoreState {
        let mut state = StoreState::new();
        state.apply(
            SequenceNumber::new(1),
            entities
                .into_iter()
                .map(|entity| PendingWrite {
                    kind: WriteKind::Insert,
                    entity,
                })
                .collect(),
        );
        state
    }

    fn gig() -> Gig {
        Gig::new(UserId::new("client"), NewGig::new("Logo", "Vector", 5))
    }

    #[test]
    fn clean_state_has_no_violations() {
        let g = gig();
        let bid = Bid::new(g.id, UserId::new("ada"), "hi", 5);
        let report = check_state(&state_with(vec![Entity::Gig(g), Entity::Bid(bid)]));
        assert!(report.is_clean());
        assert_eq!((report.gigs_checked, report.bids_checked), (1, 1));
    }

    #[test]
    fn assigned_without_hired_bid() {
        let mut g = gig();
        g.assign(UserId::new("ada"));
        let bid = Bid::new(g.id, UserId::new("ada"), "hi", 5);
        let report = check_state(&state_with(vec![Entity::Gig(g.clone()), Entity::Bid(bid)]));
        assert_eq!(
            report.violations,
            vec![Violation::AssignedWithoutHiredBid { gig: g.id }]
        );
    }

    #[test]
    fn hired_bid_on_open_gig_and_mismatch() {
        let g = gig();
        let mut hired = Bid::new(g.id, UserId::new("ada"), "hi", 5);
        hired.status = BidStatus::Hired;
        let report = check_state(&state_with(vec![
            Entity::Gig(g.clone()),
            Entity::Bid(hired.clone()),
        ]));
        assert_eq!(
            report.violations,
            vec![Violation::SettledBidOnOpenGig {
                gig: g.id,
                bid: hired.id,
                status: BidStatus::Hired,
            }]
        );

        let mut assigned = gig();
        assigned.assign(UserId::new("bob"));
        let mut other = Bid::new(assigned.id, UserId::new("ada"), "hi", 5);
        other.status = BidStatus::Hired;
        let report = check_state(&state_with(vec![
            Entity::Gig(assigned),
            Entity::Bid(other),
        ]));
        assert!(matches!(
            report.violations.as_slice(),
            [Violation::AssigneeMismatch { .. }]
        ));
    }

    #[test]
    fn duplicate_pair() {
        let g = gig();
        let first = Bid::new(g.id, UserId::new("ada"), "one", 5);
        let second = Bid::new(g.id, UserId::new("ada"), "two", 5);
        let report = check_state(&state_with(vec![
            Entity::Gig(g.clone()),
            Entity::Bid(first),
            Entity::Bid(second),
        ]));
        assert!(matches!(
            report.violations.as_slice(),
            [Violation::DuplicatePair { gig, bids, .. }] if *gig == g.id && bids.len() == 2
        ));
    }

    #[test]
    fn orphan_bid() {
        let bid = Bid::new(EntityId::new(), UserId::new("ada"), "hi", 5);
        let report = check_state(&state_with(vec![Entity::Bid(bid.clone())]));
        assert_eq!(
            report.violations,
            vec![Violation::OrphanBid {
                bid: bid.id,
                gig: bid.gig,
            }]
        );
    }
}
