//! Listings: ordering, search, and owner-only bid listings.

use gigmarket_core::{GigFilter, GigStatus, MarketError, NewGig, SubmitBid, UserId};
use gigmarket_testkit::prelude::*;

#[test]
fn search_is_case_insensitive_substring() {
    let market = TestMarket::memory();
    let web = market
        .create_gig(&client(), NewGig::new("Build a web site", "Five pages", 900))
        .unwrap();
    market
        .create_gig(&client(), NewGig::new("Landscaping", "Front yard", 400))
        .unwrap();

    for needle in ["web", "WEB", "Web", " web "] {
        let found = market.list_gigs(&GigFilter::new().search(needle)).unwrap();
        assert_eq!(found, vec![web.clone()], "search {needle:?}");
    }
}

#[test]
fn search_covers_title_or_description() {
    let market = TestMarket::memory();
    let by_title = market
        .create_gig(&client(), NewGig::new("Logo design", "Vector art", 100))
        .unwrap();
    let by_description = market
        .create_gig(&client(), NewGig::new("Branding", "Needs a LOGO", 100))
        .unwrap();
    market
        .create_gig(&client(), NewGig::new("Plumbing", "Kitchen sink", 100))
        .unwrap();

    let found = market.list_gigs(&GigFilter::new().search("logo")).unwrap();
    assert_eq!(found, vec![by_description, by_title]);
}

#[test]
fn blank_search_matches_everything() {
    let market = TestMarket::memory();
    seed_gig(&market, "One");
    seed_gig(&market, "Two");

    assert_eq!(market.list_gigs(&GigFilter::new().search("  ")).unwrap().len(), 2);
    assert!(market
        .list_gigs(&GigFilter::new().search("nothing like it"))
        .unwrap()
        .is_empty());
}

#[test]
fn gigs_are_listed_newest_first() {
    let market = TestMarket::memory();
    let ids: Vec<_> = (0..5).map(|i| seed_gig(&market, &format!("Gig {i}")).id).collect();

    let listed: Vec<_> = market
        .list_gigs(&GigFilter::new())
        .unwrap()
        .into_iter()
        .map(|g| g.id)
        .collect();
    let mut expected = ids;
    expected.reverse();
    assert_eq!(listed, expected);
}

#[test]
fn updates_do_not_reorder_gigs() {
    let market = TestMarket::memory();
    let old = seed_gig(&market, "Old");
    let new = seed_gig(&market, "New");
    let patch = gigmarket_core::GigPatch {
        title: Some("Old, edited".into()),
        ..Default::default()
    };
    market.update_gig(old.id, &client(), patch).unwrap();

    let listed = market.list_gigs(&GigFilter::new()).unwrap();
    assert_eq!(listed[0].id, new.id);
    assert_eq!(listed[1].title, "Old, edited");
}

#[test]
fn status_filter_combines_with_search() {
    let market = TestMarket::memory();
    let assigned = seed_gig_with_bids_from(&market, &client(), "Web shop", 1);
    let open = seed_gig_with_bids_from(&market, &client(), "Web blog", 1);
    seed_gig(&market, "Garden");
    market.hire(assigned.bids[0].id, &assigned.owner).unwrap();

    let open_web = market
        .list_gigs(&GigFilter::new().search("web").status(GigStatus::Open))
        .unwrap();
    assert_eq!(open_web.len(), 1);
    assert_eq!(open_web[0].id, open.gig.id);

    let all_assigned = market
        .list_gigs(&GigFilter::new().status(GigStatus::Assigned))
        .unwrap();
    assert_eq!(all_assigned.len(), 1);
    assert_eq!(all_assigned[0].id, assigned.gig.id);
}

#[test]
fn bids_for_gig_are_owner_only_and_newest_first() {
    let market = TestMarket::memory();
    let scenario = seed_gig_with_bids(&market, 3);

    let listed: Vec<_> = market
        .list_bids_for_gig(scenario.gig.id, &scenario.owner)
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    let expected: Vec<_> = scenario.bids.iter().rev().map(|b| b.id).collect();
    assert_eq!(listed, expected);

    let err = market
        .list_bids_for_gig(scenario.gig.id, scenario.bidder(0))
        .unwrap_err();
    assert!(matches!(err, MarketError::Forbidden { .. }), "{err:?}");

    let err = market
        .list_bids_for_gig(gigmarket_core::EntityId::new(), &scenario.owner)
        .unwrap_err();
    assert!(matches!(err, MarketError::NotFound { .. }), "{err:?}");
}

#[test]
fn my_bids_carry_their_gigs() {
    let market = TestMarket::memory();
    let first = seed_gig(&market, "Logo");
    let second = seed_gig(&market, "Site");
    let me = freelancer(0);
    market
        .submit_bid(SubmitBid::new(first.id, me.clone(), "one", 10))
        .unwrap();
    let hired = market
        .submit_bid(SubmitBid::new(second.id, me.clone(), "two", 20))
        .unwrap();
    market
        .submit_bid(SubmitBid::new(second.id, freelancer(1), "other", 15))
        .unwrap();
    market.hire(hired.id, &client()).unwrap();

    let mine = market.list_my_bids(&me).unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].bid.id, hired.id);
    assert_eq!(mine[0].gig.id, second.id);
    assert_eq!(mine[0].gig.status, GigStatus::Assigned);
    assert_eq!(mine[1].gig.id, first.id);

    assert!(market.list_my_bids(&UserId::new("nobody")).unwrap().is_empty());
}
