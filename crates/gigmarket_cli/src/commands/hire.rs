//! `hire` command.

use crate::commands::{parse_id, Session};
use crate::output::{emit, print_bid, print_gig};

pub fn run(session: &Session, bid: &str) -> Result<(), Box<dyn std::error::Error>> {
    let requester = session.user("hire")?;
    let outcome = session
        .market
        .hire_within(parse_id(bid)?, requester, session.timeout)?;

    emit(session.format, &outcome, |outcome| {
        println!("Hired {}", outcome.bid.freelancer);
        print_bid(&outcome.bid);
        print_gig(&outcome.gig);
        println!("Rejected {} other bid(s)", outcome.rejected.len());
    })?;
    Ok(())
}
