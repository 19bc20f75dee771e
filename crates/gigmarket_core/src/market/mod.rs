//! Marketplace operations over the entity store.
//!
//! - `admission`: the bid admission gate
//! - `hire`: the hire coordinator
//! - `query`: listings
//! - `gigs`: gig creation and updates
//! - `integrity`: invariant verification

pub(crate) mod admission;
pub(crate) mod gigs;
pub(crate) mod hire;
pub(crate) mod integrity;
pub(crate) mod query;

pub use integrity::{IntegrityReport, Violation};

use crate::config::Config;
use crate::entity::{EntityId, UserId};
use crate::error::{CoreError, MarketError, MarketResult};
use crate::model::{Bid, Gig, GigStatus};
use crate::store::{EntityStore, Transaction};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// What every operation runs against: the store, the configuration and the
/// caller's timeout.
#[derive(Clone, Copy)]
pub(crate) struct OpContext<'a> {
    pub store: &'a EntityStore,
    pub config: &'a Config,
    pub timeout: Duration,
}

impl<'a> OpContext<'a> {
    pub(crate) fn begin(&self) -> MarketResult<Transaction<'a>> {
        Ok(self.store.begin(self.timeout)?)
    }

    /// Re-runs `attempt` while it fails on a write conflict, at most
    /// `max_conflict_retries` times.
    pub(crate) fn retry_conflicts<T>(
        &self,
        op: &'static str,
        mut attempt: impl FnMut() -> MarketResult<T>,
    ) -> MarketResult<T> {
        let mut retries = 0;
        loop {
            match attempt() {
                Err(err) if is_write_conflict(&err) && retries < self.config.max_conflict_retries => {
                    retries += 1;
                    debug!(op, retries, error = %err, "write conflict, retrying");
                }
                result => return result,
            }
        }
    }
}

fn is_write_conflict(err: &MarketError) -> bool {
    matches!(
        err,
        MarketError::TransactionFailed {
            source: CoreError::WriteConflict { .. }
        }
    )
}

/// A bid submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitBid {
    /// The gig bid on.
    pub gig: EntityId,
    /// The bidder, as supplied by the authentication layer.
    pub freelancer: UserId,
    /// Proposal text.
    pub message: String,
    /// Asking price in minor currency units.
    pub price: u64,
}

impl SubmitBid {
    /// Creates a submission.
    pub fn new(gig: EntityId, freelancer: UserId, message: impl Into<String>, price: u64) -> Self {
        Self {
            gig,
            freelancer,
            message: message.into(),
            price,
        }
    }
}

/// Result of a successful hire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HireOutcome {
    /// The chosen bid, now hired.
    pub bid: Bid,
    /// The gig, now assigned to the bid's freelancer.
    pub gig: Gig,
    /// Sibling bids rejected by the same commit.
    pub rejected: Vec<EntityId>,
}

/// A bid together with the gig it was placed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BidWithGig {
    /// The bid.
    pub bid: Bid,
    /// Its gig.
    pub gig: Gig,
}

/// Filter for gig listings. The default matches every gig.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GigFilter {
    /// Case-insensitive substring over title or description.
    pub search: Option<String>,
    /// Required status.
    pub status: Option<GigStatus>,
    /// Required owner ("my gigs").
    pub owner: Option<UserId>,
}

impl GigFilter {
    /// Creates a filter that matches everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the search text. Blank text disables the text filter.
    #[must_use]
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Restricts the listing to one status.
    #[must_use]
    pub fn status(mut self, status: GigStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts the listing to gigs posted by `owner`.
    #[must_use]
    pub fn owner(mut self, owner: UserId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub(crate) fn matches(&self, gig: &Gig, needle: Option<&str>) -> bool {
        if let Some(status) = self.status {
            if gig.status != status {
                return false;
            }
        }
        if self.owner.as_ref().is_some_and(|owner| *owner != gig.owner) {
            return false;
        }
        needle.map_or(true, |needle| gig.matches_text(needle))
    }

    /// The lowercased search text, if any.
    pub(crate) fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Marketplace;
    use std::cell::Cell;

    fn conflict() -> MarketError {
        CoreError::WriteConflict {
            key: "gig bids".to_string(),
        }
        .into()
    }

    fn run_with(retries: u32, conflicts: u32) -> (MarketResult<u32>, u32) {
        let market = Marketplace::open_in_memory().unwrap();
        let config = Config::new().max_conflict_retries(retries);
        let ctx = OpContext {
            store: market.store(),
            config: &config,
            timeout: Duration::from_secs(1),
        };
        let calls = Cell::new(0);
        let result = ctx.retry_conflicts("test", || {
            calls.set(calls.get() + 1);
            if calls.get() <= conflicts {
                Err(conflict())
            } else {
                Ok(calls.get())
            }
        });
        (result, calls.get())
    }

    #[test]
    fn conflicts_are_retried_until_success() {
        let (result, calls) = run_with(3, 2);
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn exhausted_retries_return_the_conflict() {
        let (result, calls) = run_with(3, u32::MAX);
        assert_eq!(calls, 4);
        assert!(is_write_conflict(&result.unwrap_err()));

        let (result, calls) = run_with(0, 1);
        assert_eq!(calls, 1);
        assert!(matches!(
            result,
            Err(MarketError::TransactionFailed {
                source: CoreError::WriteConflict { .. }
            })
        ));
    }

    #[test]
    fn other_errors_are_not_retried() {
        let market = Marketplace::open_in_memory().unwrap();
        let ctx = OpContext {
            store: market.store(),
            config: market.config(),
            timeout: Duration::from_secs(1),
        };
        let calls = Cell::new(0);
        let result: MarketResult<()> = ctx.retry_conflicts("test", || {
            calls.set(calls.get() + 1);
            Err(CoreError::StoreClosed.into())
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
