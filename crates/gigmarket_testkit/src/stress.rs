//! Race and stress harnesses.
//!
//! Each harness lines its threads up on a [`Barrier`] so the operations
//! under test start as close together as the scheduler allows.

use gigmarket_core::{
    Bid, EntityId, HireOutcome, MarketError, MarketResult, Marketplace, NewGig, SubmitBid, UserId,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};

/// Results of a set of racing calls, in thread order.
#[derive(Debug)]
pub struct RaceOutcome<T> {
    /// What every thread got back.
    pub results: Vec<MarketResult<T>>,
}

impl<T> RaceOutcome<T> {
    /// The successful results.
    pub fn winners(&self) -> Vec<&T> {
        self.results.iter().filter_map(|r| r.as_ref().ok()).collect()
    }

    /// The errors.
    pub fn losers(&self) -> Vec<&MarketError> {
        self.results.iter().filter_map(|r| r.as_ref().err()).collect()
    }

    /// Whether every error matches `pred`.
    pub fn all_losers(&self, pred: impl Fn(&MarketError) -> bool) -> bool {
        self.losers().into_iter().all(pred)
    }
}

/// Runs `op(i)` on `threads` threads released together.
pub fn race<T, F>(threads: usize, op: F) -> RaceOutcome<T>
where
    T: Send,
    F: Fn(usize) -> MarketResult<T> + Sync,
{
    let barrier = Barrier::new(threads);
    let results: Vec<MarketResult<T>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let barrier = &barrier;
                let op = &op;
                scope.spawn(move || {
                    barrier.wait();
                    op(i)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("Race thread panicked"))
            .collect()
    });
    RaceOutcome { results }
}

/// Every thread hires a different bid of the same gig.
pub fn race_hires(market: &Marketplace, bids: &[Bid], requester: &UserId) -> RaceOutcome<HireOutcome> {
    race(bids.len(), |i| market.hire(bids[i].id, requester))
}

/// Every thread hires the same bid.
pub fn race_same_hire(
    market: &Marketplace,
    bid: EntityId,
    requester: &UserId,
    threads: usize,
) -> RaceOutcome<HireOutcome> {
    race(threads, |_| market.hire(bid, requester))
}

/// Every thread submits a bid for the same `(gig, freelancer)` pair.
pub fn race_duplicate_bids(
    market: &Marketplace,
    gig: EntityId,
    freelancer: &UserId,
    threads: usize,
) -> RaceOutcome<Bid> {
    race(threads, |i| {
        market.submit_bid(SubmitBid::new(
            gig,
            freelancer.clone(),
            format!("attempt {i}"),
            100 + i as u64,
        ))
    })
}

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Operations refused with an expected business error.
    pub refused_ops: usize,
    /// Operations that failed in the store.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Operations per second.
    pub fn ops_per_second(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.total_ops as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Refused: {}", self.refused_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second());
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of gigs contended for.
    pub gigs: usize,
    /// Number of concurrent threads, each acting as one freelancer.
    pub threads: usize,
    /// Bid attempts per thread and gig.
    pub rounds: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            gigs: 8,
            threads: 4,
            rounds: 2,
        }
    }
}

#[derive(Default)]
struct Tally {
    ok: AtomicUsize,
    refused: AtomicUsize,
    failed: AtomicUsize,
}

impl Tally {
    fn record<T>(&self, result: &MarketResult<T>) {
        let counter = match result {
            Ok(_) => &self.ok,
            Err(e) if e.is_retryable() => &self.failed,
            Err(_) => &self.refused,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Freelancer threads bid on every gig while the owner thread hires the
/// first bid it finds on each.
///
/// Bids racing a hire are refused with `GigAlreadyAssigned`, and repeated
/// rounds are refused with `DuplicateBid`.
pub fn stress_bid_and_hire(market: &Marketplace, config: &StressConfig) -> StressTestResult {
    let owner = UserId::new("stress-owner");
    let gigs: Vec<EntityId> = (0..config.gigs)
        .map(|i| {
            market
                .create_gig(&owner, NewGig::new(format!("gig {i}"), "stress", 500))
                .expect("Failed to create gig")
                .id
        })
        .collect();

    let tally = Tally::default();
    let barrier = Barrier::new(config.threads + 1);
    let start = Instant::now();

    thread::scope(|scope| {
        for t in 0..config.threads {
            let (gigs, tally, barrier) = (&gigs, &tally, &barrier);
            scope.spawn(move || {
                let freelancer = UserId::new(format!("stress-freelancer-{t}"));
                barrier.wait();
                for _ in 0..config.rounds {
                    for &gig in gigs {
                        let result = market.submit_bid(SubmitBid::new(
                            gig,
                            freelancer.clone(),
                            "stress bid",
                            100,
                        ));
                        tally.record(&result);
                    }
                }
            });
        }

        let (gigs, tally, barrier, owner) = (&gigs, &tally, &barrier, &owner);
        scope.spawn(move || {
            barrier.wait();
            for &gig in gigs {
                let first = loop {
                    match market.list_bids_for_gig(gig, owner) {
                        Ok(bids) if !bids.is_empty() => break bids.last().map(|b| b.id),
                        Ok(_) if start.elapsed() > Duration::from_secs(5) => break None,
                        Ok(_) => thread::yield_now(),
                        Err(e) => {
                            tally.record::<()>(&Err(e));
                            break None;
                        }
                    }
                };
                if let Some(bid) = first {
                    tally.record(&market.hire(bid, owner));
                }
            }
        });
    });

    let successful_ops = tally.ok.into_inner();
    let refused_ops = tally.refused.into_inner();
    let failed_ops = tally.failed.into_inner();
    StressTestResult {
        total_ops: successful_ops + refused_ops + failed_ops,
        successful_ops,
        refused_ops,
        failed_ops,
        duration: start.elapsed(),
    }
}
