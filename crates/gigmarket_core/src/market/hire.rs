//! Hire coordinator.
//!
//! A hire moves a gig from OPEN to ASSIGNED. One commit carries:
//!
//! - the gig, assigned to the bid's freelancer
//! - the chosen bid, now HIRED
//! - every other PENDING bid of the gig, now REJECTED
//!
//! plus a `GigStatus { expected: Open }` precondition. The precondition is
//! evaluated under the commit lock, so of two racing hires on one gig exactly
//! one commits and the other gets `GigAlreadyAssigned`. The bid set of the
//! gig is in the read set: a bid admitted after the siblings were loaded
//! forces the hire to start over, so it cannot stay PENDING on an assigned gig.

use crate::entity::{EntityId, UserId};
use crate::error::{CoreError, MarketError, MarketResult};
use crate::market::{HireOutcome, OpContext};
use crate::model::{BidStatus, Entity, GigStatus};
use crate::store::Precondition;
use tracing::{error, info};

pub(crate) fn hire(
    ctx: &OpContext<'_>,
    bid_id: EntityId,
    requester: &UserId,
) -> MarketResult<HireOutcome> {
    ctx.retry_conflicts("hire", || attempt(ctx, bid_id, requester))
}

fn attempt(ctx: &OpContext<'_>, bid_id: EntityId, requester: &UserId) -> MarketResult<HireOutcome> {
    let mut txn = ctx.begin()?;

    let mut bid = txn
        .bid(bid_id)?
        .ok_or_else(|| MarketError::bid_not_found(bid_id))?;
    let mut gig = txn
        .gig(bid.gig)?
        .ok_or_else(|| MarketError::gig_not_found(bid.gig))?;

    if gig.owner != *requester {
        return Err(MarketError::Forbidden {
            gig: gig.id,
            requester: requester.clone(),
        });
    }
    if !gig.is_open() {
        return Err(MarketError::GigAlreadyAssigned { gig: gig.id });
    }
    if !bid.is_pending() {
        error!(
            gig = %gig.id,
            bid = %bid.id,
            status = %bid.status,
            "integrity check failed: chosen bid is not pending on an open gig"
        );
        return Err(MarketError::invalid_input(format!(
            "bid {} is {}, only pending bids can be hired",
            bid.id, bid.status
        )));
    }

    gig.assign(bid.freelancer.clone());
    bid.status = BidStatus::Hired;

    txn.require(Precondition::GigStatus {
        gig: gig.id,
        expected: GigStatus::Open,
    });
    txn.update(Entity::Gig(gig.clone()));
    txn.update(Entity::Bid(bid.clone()));

    let mut rejected = Vec::new();
    for mut sibling in txn.bids_for_gig(gig.id)? {
        if sibling.id == bid.id {
            continue;
        }
        if !sibling.is_pending() {
            error!(
                gig = %gig.id,
                bid = %sibling.id,
                status = %sibling.status,
                "integrity check failed: non-pending sibling bid on an open gig, left untouched"
            );
            continue;
        }
        sibling.status = BidStatus::Rejected;
        rejected.push(sibling.id);
        txn.update(Entity::Bid(sibling));
    }

    match txn.commit() {
        Ok(sequence) => {
            info!(
                gig = %gig.id,
                bid = %bid.id,
                freelancer = %bid.freelancer,
                rejected = rejected.len(),
                %sequence,
                "hired"
            );
            Ok(HireOutcome { bid, gig, rejected })
        }
        Err(CoreError::PreconditionFailed { gig, .. }) => {
            Err(MarketError::GigAlreadyAssigned { gig })
        }
        Err(err) => Err(err.into()),
    }
}
