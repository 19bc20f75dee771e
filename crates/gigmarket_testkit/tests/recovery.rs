//! Reopening stores: replay, torn tails, corruption, directory locking.

use gigmarket_core::{
    BidStatus, CoreError, GigStatus, MarketError, Marketplace, NewGig, StoreDir, SubmitBid,
};
use gigmarket_storage::InMemoryBackend;
use gigmarket_testkit::prelude::*;
use std::io::Write;

#[test]
fn hired_state_survives_restart() {
    let market = TestMarket::file();
    let scenario = seed_gig_with_bids(&market, 3);
    market.hire(scenario.bids[0].id, &scenario.owner).unwrap();
    let before = MarketSnapshot::capture(&market);

    let market = market.reopen();

    assert_unchanged(&market, &before);
    assert_invariants(&market);
    let err = market
        .hire(scenario.bids[1].id, &scenario.owner)
        .unwrap_err();
    assert!(matches!(err, MarketError::GigAlreadyAssigned { .. }), "{err:?}");
}

#[test]
fn pair_uniqueness_survives_restart() {
    let market = TestMarket::memory();
    let scenario = seed_gig_with_bids(&market, 1);

    let market = market.reopen();
    let err = market
        .submit_bid(SubmitBid::new(scenario.gig.id, freelancer(0), "again", 5))
        .unwrap_err();
    assert!(matches!(err, MarketError::DuplicateBid { .. }), "{err:?}");
}

#[test]
fn torn_tail_is_dropped_on_open() {
    let market = TestMarket::memory();
    let scenario = seed_gig_with_bids(&market, 2);
    let before = MarketSnapshot::capture(&market);
    let clean = market.log_bytes().unwrap();

    // Half a record header, as left by a crash mid-append.
    let mut torn = clean.clone();
    torn.extend_from_slice(b"GWAL\x01\x00\x02");
    let backend = InMemoryBackend::with_data(torn);
    let reopened = Marketplace::open_with_backend(test_config(), Box::new(backend.clone())).unwrap();

    assert_unchanged(&reopened, &before);
    assert_eq!(backend.snapshot(), clean);

    // The log keeps working after the truncation.
    reopened.hire(scenario.bids[1].id, &scenario.owner).unwrap();
    drop(reopened);
    let again = Marketplace::open_with_backend(test_config(), Box::new(backend)).unwrap();
    assert_eq!(
        again.get_gig(scenario.gig.id).unwrap().status,
        GigStatus::Assigned
    );
}

#[test]
fn torn_tail_in_file_is_dropped_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let gig = {
        let market = Marketplace::open_with_config(dir.path(), test_config()).unwrap();
        let gig = seed_gig(&market, "Logo");
        market.close().unwrap();
        gig
    };

    let log_path = StoreDir::log_path_in(dir.path());
    let clean_len = std::fs::metadata(&log_path).unwrap().len();
    let mut file = std::fs::OpenOptions::new().append(true).open(&log_path).unwrap();
    file.write_all(b"GWAL\x01\x00\x02\x10\x00\x00\x00abc").unwrap();
    drop(file);

    let market = Marketplace::open_with_config(dir.path(), test_config()).unwrap();
    assert_eq!(market.get_gig(gig.id).unwrap(), gig);
    assert_eq!(std::fs::metadata(&log_path).unwrap().len(), clean_len);
}

#[test]
fn corrupted_record_refuses_to_open() {
    let market = TestMarket::memory();
    seed_gig_with_bids(&market, 1);
    let mut bytes = market.log_bytes().unwrap();
    // Inside the payload of the first record.
    bytes[12] ^= 0xFF;

    let err = Marketplace::open_with_backend(
        test_config(),
        Box::new(InMemoryBackend::with_data(bytes)),
    )
    .unwrap_err();
    assert!(
        matches!(
            err,
            CoreError::ChecksumMismatch { .. } | CoreError::LogCorruption { .. }
        ),
        "{err:?}"
    );
}

#[test]
fn garbage_log_refuses_to_open() {
    let err = Marketplace::open_with_backend(
        test_config(),
        Box::new(InMemoryBackend::with_data(b"definitely not a log file".to_vec())),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::LogCorruption { .. }), "{err:?}");
}

#[test]
fn directory_is_exclusive() {
    let market = TestMarket::file();
    let err = Marketplace::open(market.path().unwrap()).unwrap_err();
    assert!(matches!(err, CoreError::StoreLocked), "{err:?}");
}

#[test]
fn missing_directory_is_refused_without_create() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config().create_if_missing(false);
    assert!(Marketplace::open_with_config(&dir.path().join("absent"), config).is_err());
}

#[test]
fn closed_market_fails_as_transaction_failure() {
    let market = TestMarket::memory();
    let gig = seed_gig(&market, "Logo");
    market.close().unwrap();

    let err = market
        .submit_bid(SubmitBid::new(gig.id, freelancer(0), "hi", 1))
        .unwrap_err();
    assert!(
        matches!(
            err,
            MarketError::TransactionFailed {
                source: CoreError::StoreClosed
            }
        ),
        "{err:?}"
    );
    assert!(!err.is_retryable());
}

#[test]
fn replay_restores_listing_order() {
    let market = TestMarket::memory();
    let ids: Vec<_> = (0..4)
        .map(|i| {
            market
                .create_gig(&client(), NewGig::new(format!("Gig {i}"), "x", 10))
                .unwrap()
                .id
        })
        .collect();
    let bid = market
        .submit_bid(SubmitBid::new(ids[0], freelancer(0), "hi", 5))
        .unwrap();
    market.hire(bid.id, &client()).unwrap();

    let market = market.reopen();
    let listed: Vec<_> = market
        .list_gigs(&gigmarket_core::GigFilter::new())
        .unwrap()
        .into_iter()
        .map(|g| g.id)
        .collect();
    assert_eq!(listed, ids.into_iter().rev().collect::<Vec<_>>());
    let mine = market.list_my_bids(&freelancer(0)).unwrap();
    assert_eq!(mine[0].bid.status, BidStatus::Hired);
}
