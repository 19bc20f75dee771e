//! Benchmark utilities.

use gigmarket_core::{Bid, Config, Gig, Marketplace, NewGig, SubmitBid, UserId};
use gigmarket_storage::InMemoryBackend;
use rand::seq::SliceRandom;
use rand::Rng;

const WORDS: &[&str] = &[
    "web", "site", "logo", "design", "garden", "plumbing", "react", "mobile", "app", "copy",
    "editing", "video", "audio", "landing", "page", "shop", "data", "report",
];

/// Opens an in-memory market without fsync.
pub fn bench_market() -> (Marketplace, InMemoryBackend) {
    let backend = InMemoryBackend::new();
    let market = Marketplace::open_with_backend(
        Config::new().sync_on_commit(false),
        Box::new(backend.clone()),
    )
    .unwrap();
    (market, backend)
}

/// A random phrase of `words` words.
pub fn random_phrase(words: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..words)
        .map(|_| *WORDS.choose(&mut rng).unwrap_or(&"task"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Creates a gig owned by `owner` with `bids` pending bids at random prices.
pub fn gig_with_bids(market: &Marketplace, owner: &UserId, bids: usize) -> (Gig, Vec<Bid>) {
    let mut rng = rand::thread_rng();
    let gig = market
        .create_gig(owner, NewGig::new(random_phrase(3), random_phrase(12), 10_000))
        .unwrap();
    let bids = (0..bids)
        .map(|i| {
            market
                .submit_bid(SubmitBid::new(
                    gig.id,
                    UserId::new(format!("freelancer-{i}")),
                    random_phrase(8),
                    rng.gen_range(1..10_000),
                ))
                .unwrap()
        })
        .collect();
    (gig, bids)
}
