//! Bid admission gate.
//!
//! Checks run in a fixed order, each with its own error:
//!
//! 1. the gig exists (`NotFound`)
//! 2. the gig is open (`GigAlreadyAssigned`)
//! 3. the bidder is not the owner (`OwnerCannotBid`)
//! 4. the bidder has no bid on the gig yet (`DuplicateBid`)
//! 5. price and message are valid (`InvalidInput`)
//!
//! Check 4 is only a fast path. The unique `(gig, freelancer)` index decides
//! at commit, and the commit also requires the gig to still be open.

use crate::config::Config;
use crate::error::{CoreError, MarketError, MarketResult};
use crate::market::{OpContext, SubmitBid};
use crate::model::{Bid, Entity, GigStatus};
use crate::store::Precondition;
use tracing::info;

pub(crate) fn submit_bid(ctx: &OpContext<'_>, request: &SubmitBid) -> MarketResult<Bid> {
    ctx.retry_conflicts("submit_bid", || attempt(ctx, request))
}

fn attempt(ctx: &OpContext<'_>, request: &SubmitBid) -> MarketResult<Bid> {
    let mut txn = ctx.begin()?;

    let gig = txn
        .gig(request.gig)?
        .ok_or_else(|| MarketError::gig_not_found(request.gig))?;
    if !gig.is_open() {
        return Err(MarketError::GigAlreadyAssigned { gig: gig.id });
    }
    if request.freelancer == gig.owner {
        return Err(MarketError::OwnerCannotBid {
            gig: gig.id,
            owner: gig.owner,
        });
    }
    if txn.bid_for_pair(gig.id, &request.freelancer)?.is_some() {
        return Err(duplicate(request));
    }
    validate(ctx.config, request)?;

    let bid = Bid::new(
        gig.id,
        request.freelancer.clone(),
        request.message.clone(),
        request.price,
    );
    txn.require(Precondition::GigStatus {
        gig: gig.id,
        expected: GigStatus::Open,
    });
    txn.insert(Entity::Bid(bid.clone()));

    match txn.commit() {
        Ok(sequence) => {
            info!(
                bid = %bid.id,
                gig = %gig.id,
                freelancer = %bid.freelancer,
                %sequence,
                "bid admitted"
            );
            Ok(bid)
        }
        Err(CoreError::PreconditionFailed { gig, .. }) => {
            Err(MarketError::GigAlreadyAssigned { gig })
        }
        Err(CoreError::UniqueViolation { .. }) => Err(duplicate(request)),
        Err(err) => Err(err.into()),
    }
}

fn duplicate(request: &SubmitBid) -> MarketError {
    MarketError::DuplicateBid {
        gig: request.gig,
        freelancer: request.freelancer.clone(),
    }
}

fn validate(config: &Config, request: &SubmitBid) -> MarketResult<()> {
    if request.price == 0 {
        return Err(MarketError::invalid_input("price must be positive"));
    }
    if request.message.trim().is_empty() {
        return Err(MarketError::invalid_input("message must not be empty"));
    }
    let len = request.message.chars().count();
    if len > config.max_message_len {
        return Err(MarketError::invalid_input(format!(
            "message is {len} characters, the limit is {}",
            config.max_message_len
        )));
    }
    Ok(())
}
