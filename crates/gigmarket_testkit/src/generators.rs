//! Property-based test generators using proptest.
//!
//! Besides value strategies, this module generates whole sequences of
//! marketplace operations and runs them against a [`ModelMarket`], a plain
//! in-memory model that predicts which error kind each call must return.

use gigmarket_core::{
    BidStatus, EntityId, GigPatch, MarketError, Marketplace, NewGig, SubmitBid, UserId,
};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

/// Size of the user pool operations draw callers from.
pub const USER_POOL: usize = 4;

/// The `i`-th pooled user.
pub fn pooled_user(i: usize) -> UserId {
    UserId::new(format!("user-{}", i % USER_POOL))
}

/// Strategy for generating valid entity IDs.
pub fn entity_id_strategy() -> impl Strategy<Value = EntityId> {
    prop::array::uniform16(any::<u8>()).prop_map(EntityId::from_bytes)
}

/// Strategy for pooled users.
pub fn user_strategy() -> impl Strategy<Value = UserId> {
    (0..USER_POOL).prop_map(pooled_user)
}

/// Strategy for prices, including the invalid zero.
pub fn price_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![
        1 => Just(0u64),
        9 => 1u64..100_000,
    ]
}

/// Strategy for bid messages, sometimes blank.
pub fn message_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        1 => Just(String::new()),
        1 => Just("   ".to_string()),
        8 => prop::string::string_regex("[a-z]{1,12}( [a-z]{1,12}){0,4}").expect("Invalid regex"),
    ]
}

/// Strategy for gig titles.
pub fn title_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z]{1,10}( [A-Za-z]{1,10}){0,3}").expect("Invalid regex")
}

/// One marketplace call.
///
/// Selectors pick among the gigs and bids created so far, modulo their
/// count; with none created yet they name an unknown ID.
#[derive(Debug, Clone)]
pub enum Op {
    /// Post a gig.
    CreateGig {
        /// Owner, from the pool.
        owner: usize,
        /// Title.
        title: String,
        /// Budget.
        budget: u64,
    },
    /// Bid on a gig.
    SubmitBid {
        /// Which gig.
        gig: usize,
        /// Bidder, from the pool.
        freelancer: usize,
        /// Message.
        message: String,
        /// Price.
        price: u64,
    },
    /// Hire a bid.
    Hire {
        /// Which bid.
        bid: usize,
        /// Caller, from the pool.
        requester: usize,
    },
    /// Change a gig's budget.
    UpdateBudget {
        /// Which gig.
        gig: usize,
        /// Caller, from the pool.
        requester: usize,
        /// New budget.
        budget: u64,
    },
}

/// Strategy for a single operation.
pub fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => (0..USER_POOL, title_strategy(), price_strategy())
            .prop_map(|(owner, title, budget)| Op::CreateGig { owner, title, budget }),
        5 => (any::<usize>(), 0..USER_POOL, message_strategy(), price_strategy()).prop_map(
            |(gig, freelancer, message, price)| Op::SubmitBid {
                gig,
                freelancer,
                message,
                price,
            }
        ),
        2 => (any::<usize>(), 0..USER_POOL)
            .prop_map(|(bid, requester)| Op::Hire { bid, requester }),
        1 => (any::<usize>(), 0..USER_POOL, price_strategy())
            .prop_map(|(gig, requester, budget)| Op::UpdateBudget { gig, requester, budget }),
    ]
}

/// Strategy for an operation sequence of up to `max_len` calls.
pub fn op_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(), 1..=max_len)
}

/// The outcome the model predicts for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// The call succeeds.
    Ok,
    /// `NotFound`.
    NotFound,
    /// `Forbidden`.
    Forbidden,
    /// `OwnerCannotBid`.
    OwnerCannotBid,
    /// `DuplicateBid`.
    DuplicateBid,
    /// `InvalidInput`.
    InvalidInput,
    /// `GigAlreadyAssigned`.
    GigAlreadyAssigned,
}

impl Expected {
    /// Classifies an actual result.
    ///
    /// # Panics
    ///
    /// On `TransactionFailed`, which a single-threaded healthy store never
    /// returns.
    pub fn of<T>(result: &Result<T, MarketError>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(MarketError::NotFound { .. }) => Self::NotFound,
            Err(MarketError::Forbidden { .. }) => Self::Forbidden,
            Err(MarketError::OwnerCannotBid { .. }) => Self::OwnerCannotBid,
            Err(MarketError::DuplicateBid { .. }) => Self::DuplicateBid,
            Err(MarketError::InvalidInput { .. }) => Self::InvalidInput,
            Err(MarketError::GigAlreadyAssigned { .. }) => Self::GigAlreadyAssigned,
            Err(e @ MarketError::TransactionFailed { .. }) => {
                panic!("unexpected store failure: {e}")
            }
        }
    }
}

#[derive(Debug, Clone)]
struct ModelGig {
    owner: UserId,
    assigned_to: Option<UserId>,
}

#[derive(Debug, Clone)]
struct ModelBid {
    gig: EntityId,
    freelancer: UserId,
    status: BidStatus,
}

/// Reference model of the marketplace rules.
#[derive(Debug, Default)]
pub struct ModelMarket {
    gig_order: Vec<EntityId>,
    bid_order: Vec<EntityId>,
    gigs: HashMap<EntityId, ModelGig>,
    bids: HashMap<EntityId, ModelBid>,
    pairs: HashSet<(EntityId, UserId)>,
}

impl ModelMarket {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of gigs created.
    pub fn gig_count(&self) -> usize {
        self.gig_order.len()
    }

    /// Number of bids admitted.
    pub fn bid_count(&self) -> usize {
        self.bid_order.len()
    }

    /// Number of gigs with a hire.
    pub fn assigned_count(&self) -> usize {
        self.gigs.values().filter(|g| g.assigned_to.is_some()).count()
    }

    /// Status the model holds for `bid`.
    pub fn bid_status(&self, bid: EntityId) -> Option<BidStatus> {
        self.bids.get(&bid).map(|b| b.status)
    }

    fn pick(order: &[EntityId], selector: usize) -> EntityId {
        if order.is_empty() {
            EntityId::new()
        } else {
            order[selector % order.len()]
        }
    }

    /// Runs `op` against `market` and checks the result kind against the
    /// model, then updates the model.
    ///
    /// # Panics
    ///
    /// When the market and the model disagree.
    pub fn apply(&mut self, market: &Marketplace, op: &Op) {
        match op {
            Op::CreateGig {
                owner,
                title,
                budget,
            } => {
                let owner = pooled_user(*owner);
                let expected = if *budget == 0 {
                    Expected::InvalidInput
                } else {
                    Expected::Ok
                };
                let result = market.create_gig(&owner, NewGig::new(title.clone(), "generated", *budget));
                assert_eq!(Expected::of(&result), expected, "{op:?} -> {result:?}");
                if let Ok(gig) = result {
                    self.gig_order.push(gig.id);
                    self.gigs.insert(
                        gig.id,
                        ModelGig {
                            owner,
                            assigned_to: None,
                        },
                    );
                }
            }
            Op::SubmitBid {
                gig,
                freelancer,
                message,
                price,
            } => {
                let gig_id = Self::pick(&self.gig_order, *gig);
                let freelancer = pooled_user(*freelancer);
                let expected = match self.gigs.get(&gig_id) {
                    None => Expected::NotFound,
                    Some(g) if g.assigned_to.is_some() => Expected::GigAlreadyAssigned,
                    Some(g) if g.owner == freelancer => Expected::OwnerCannotBid,
                    Some(_) if self.pairs.contains(&(gig_id, freelancer.clone())) => {
                        Expected::DuplicateBid
                    }
                    Some(_) if *price == 0 || message.trim().is_empty() => Expected::InvalidInput,
                    Some(_) => Expected::Ok,
                };
                let result = market.submit_bid(SubmitBid::new(
                    gig_id,
                    freelancer.clone(),
                    message.clone(),
                    *price,
                ));
                assert_eq!(Expected::of(&result), expected, "{op:?} -> {result:?}");
                if let Ok(bid) = result {
                    self.bid_order.push(bid.id);
                    self.pairs.insert((gig_id, freelancer.clone()));
                    self.bids.insert(
                        bid.id,
                        ModelBid {
                            gig: gig_id,
                            freelancer,
                            status: BidStatus::Pending,
                        },
                    );
                }
            }
            Op::Hire { bid, requester } => {
                let bid_id = Self::pick(&self.bid_order, *bid);
                let requester = pooled_user(*requester);
                let expected = match self.bids.get(&bid_id) {
                    None => Expected::NotFound,
                    Some(b) => {
                        let gig = &self.gigs[&b.gig];
                        if gig.owner != requester {
                            Expected::Forbidden
                        } else if gig.assigned_to.is_some() {
                            Expected::GigAlreadyAssigned
                        } else {
                            Expected::Ok
                        }
                    }
                };
                let result = market.hire(bid_id, &requester);
                assert_eq!(Expected::of(&result), expected, "{op:?} -> {result:?}");
                if let Ok(outcome) = result {
                    let (gig_id, winner) = {
                        let b = &self.bids[&bid_id];
                        (b.gig, b.freelancer.clone())
                    };
                    let mut rejected = 0;
                    for (id, b) in self.bids.iter_mut().filter(|(_, b)| b.gig == gig_id) {
                        if *id == bid_id {
                            b.status = BidStatus::Hired;
                        } else if b.status == BidStatus::Pending {
                            b.status = BidStatus::Rejected;
                            rejected += 1;
                        }
                    }
                    assert_eq!(outcome.rejected.len(), rejected);
                    if let Some(g) = self.gigs.get_mut(&gig_id) {
                        g.assigned_to = Some(winner);
                    }
                }
            }
            Op::UpdateBudget {
                gig,
                requester,
                budget,
            } => {
                let gig_id = Self::pick(&self.gig_order, *gig);
                let requester = pooled_user(*requester);
                let expected = match self.gigs.get(&gig_id) {
                    None => Expected::NotFound,
                    Some(g) if g.owner != requester => Expected::Forbidden,
                    Some(g) if g.assigned_to.is_some() => Expected::GigAlreadyAssigned,
                    Some(_) if *budget == 0 => Expected::InvalidInput,
                    Some(_) => Expected::Ok,
                };
                let patch = GigPatch {
                    budget: Some(*budget),
                    ..GigPatch::default()
                };
                let result = market.update_gig(gig_id, &requester, patch);
                assert_eq!(Expected::of(&result), expected, "{op:?} -> {result:?}");
            }
        }
    }

    /// Asserts that every bid's status in `market` matches the model.
    pub fn assert_matches(&self, market: &Marketplace) {
        for (id, model) in &self.bids {
            let gig = &self.gigs[&model.gig];
            let stored = market
                .list_bids_for_gig(model.gig, &gig.owner)
                .expect("Failed to list bids")
                .into_iter()
                .find(|b| b.id == *id)
                .expect("Bid missing from listing");
            assert_eq!(stored.status, model.status, "bid {id}");
        }
        for (id, model) in &self.gigs {
            let stored = market.get_gig(*id).expect("Gig missing");
            assert_eq!(stored.assigned_to, model.assigned_to, "gig {id}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn test_pooled_users_wrap() {
        assert_eq!(pooled_user(0), pooled_user(USER_POOL));
        assert_ne!(pooled_user(0), pooled_user(1));
    }

    #[test]
    fn test_sequence_strategy_respects_bounds() {
        let mut runner = TestRunner::default();
        for _ in 0..20 {
            let ops = op_sequence_strategy(8)
                .new_tree(&mut runner)
                .unwrap()
                .current();
            assert!((1..=8).contains(&ops.len()));
        }
    }

    #[test]
    fn test_model_predicts_scripted_run() {
        let market = Marketplace::open_in_memory().unwrap();
        let mut model = ModelMarket::new();
        let first = 0;
        let ops = [
            Op::CreateGig {
                owner: 0,
                title: "Logo".into(),
                budget: 100,
            },
            Op::SubmitBid {
                gig: first,
                freelancer: 0,
                message: "mine".into(),
                price: 10,
            },
            Op::SubmitBid {
                gig: first,
                freelancer: 1,
                message: "hi".into(),
                price: 10,
            },
            Op::SubmitBid {
                gig: first,
                freelancer: 1,
                message: "again".into(),
                price: 12,
            },
            Op::SubmitBid {
                gig: first,
                freelancer: 2,
                message: "me too".into(),
                price: 9,
            },
            Op::Hire {
                bid: first,
                requester: 1,
            },
            Op::Hire {
                bid: first,
                requester: 0,
            },
            Op::Hire {
                bid: first,
                requester: 0,
            },
        ];
        for op in &ops {
            model.apply(&market, op);
        }
        assert_eq!(model.bid_count(), 2);
        assert_eq!(model.assigned_count(), 1);
        model.assert_matches(&market);
    }
}
