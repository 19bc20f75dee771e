//! `bid` subcommands.

use crate::commands::{parse_id, Session};
use crate::money::{format_amount, parse_amount};
use crate::output::{emit, print_bid};
use clap::Subcommand;
use gigmarket_core::SubmitBid;

#[derive(Subcommand)]
pub enum BidCommand {
    /// Bid on a gig
    Submit {
        /// Gig ID
        gig: String,

        /// Proposal text
        #[arg(short, long)]
        message: String,

        /// Asking price, e.g. 250 or 12.50
        #[arg(long)]
        price: String,
    },

    /// List the bids on a gig you own
    List {
        /// Gig ID
        gig: String,
    },

    /// List your own bids
    Mine,
}

pub fn run(session: &Session, command: BidCommand) -> Result<(), Box<dyn std::error::Error>> {
    let market = &session.market;
    match command {
        BidCommand::Submit {
            gig,
            message,
            price,
        } => {
            let freelancer = session.user("submit a bid")?.clone();
            let request = SubmitBid::new(parse_id(&gig)?, freelancer, message, parse_amount(&price)?);
            let bid = market.submit_bid_within(request, session.timeout)?;
            emit(session.format, &bid, print_bid)?;
        }
        BidCommand::List { gig } => {
            let requester = session.user("list bids on a gig")?;
            let bids = market.list_bids_for_gig_within(parse_id(&gig)?, requester, session.timeout)?;
            emit(session.format, &bids, |bids| {
                if bids.is_empty() {
                    println!("No bids yet");
                }
                bids.iter().for_each(print_bid);
            })?;
        }
        BidCommand::Mine => {
            let freelancer = session.user("list your bids")?;
            let bids = market.list_my_bids_within(freelancer, session.timeout)?;
            emit(session.format, &bids, |bids| {
                if bids.is_empty() {
                    println!("No bids yet");
                }
                for entry in bids {
                    println!(
                        "{}  [{}]  {} on \"{}\" ({}, budget {})",
                        entry.bid.id,
                        entry.bid.status,
                        format_amount(entry.bid.price),
                        entry.gig.title,
                        entry.gig.status,
                        format_amount(entry.gig.budget)
                    );
                }
            })?;
        }
    }
    Ok(())
}
