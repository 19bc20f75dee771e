//! Listings. Every result is ordered most recent first.

use crate::entity::{EntityId, UserId};
use crate::error::{MarketError, MarketResult};
use crate::market::{BidWithGig, GigFilter, OpContext};
use crate::model::{Bid, Gig};
use crate::store::Versioned;
use std::cmp::Ordering;
use tracing::error;

/// Newest first; ties (same commit) broken by ID.
fn newest_first<T>(a: &Versioned<T>, b: &Versioned<T>, id: impl Fn(&T) -> EntityId) -> Ordering {
    b.created
        .cmp(&a.created)
        .then_with(|| id(&a.value).cmp(&id(&b.value)))
}

pub(crate) fn get_gig(ctx: &OpContext<'_>, id: EntityId) -> MarketResult<Gig> {
    ctx.store
        .read(ctx.timeout, |state| state.gig(&id).map(|v| v.value.clone()))?
        .ok_or_else(|| MarketError::gig_not_found(id))
}

pub(crate) fn list_gigs(ctx: &OpContext<'_>, filter: &GigFilter) -> MarketResult<Vec<Gig>> {
    let needle = filter.needle();
    let gigs = ctx.store.read(ctx.timeout, |state| {
        let mut found: Vec<_> = state
            .gigs()
            .filter(|v| filter.matches(&v.value, needle.as_deref()))
            .collect();
        found.sort_by(|a, b| newest_first(a, b, |g| g.id));
        found
            .into_iter()
            .map(|v| v.value.clone())
            .collect::<Vec<_>>()
    })?;
    Ok(gigs)
}

pub(crate) fn list_bids_for_gig(
    ctx: &OpContext<'_>,
    gig_id: EntityId,
    requester: &UserId,
) -> MarketResult<Vec<Bid>> {
    ctx.store.read(ctx.timeout, |state| {
        let gig = state
            .gig(&gig_id)
            .ok_or_else(|| MarketError::gig_not_found(gig_id))?;
        if gig.value.owner != *requester {
            return Err(MarketError::Forbidden {
                gig: gig_id,
                requester: requester.clone(),
            });
        }

        let mut bids: Vec<_> = state
            .bid_ids_for_gig(gig_id)
            .into_iter()
            .filter_map(|id| state.bid(&id))
            .collect();
        bids.sort_by(|a, b| newest_first(a, b, |bid| bid.id));
        Ok(bids.into_iter().map(|v| v.value.clone()).collect::<Vec<_>>())
    })?
}

pub(crate) fn list_my_bids(
    ctx: &OpContext<'_>,
    freelancer: &UserId,
) -> MarketResult<Vec<BidWithGig>> {
    let bids = ctx.store.read(ctx.timeout, |state| {
        let mut bids: Vec<_> = state
            .bid_ids_for_freelancer(freelancer)
            .into_iter()
            .filter_map(|id| state.bid(&id))
            .collect();
        bids.sort_by(|a, b| newest_first(a, b, |bid| bid.id));

        bids.into_iter()
            .filter_map(|v| match state.gig(&v.value.gig) {
                Some(gig) => Some(BidWithGig {
                    bid: v.value.clone(),
                    gig: gig.value.clone(),
                }),
                None => {
                    error!(
                        bid = %v.value.id,
                        gig = %v.value.gig,
                        "integrity check failed: bid references a missing gig"
                    );
                    None
                }
            })
            .collect::<Vec<_>>()
    })?;
    Ok(bids)
}
