//! Gig and bid records.

mod bid;
mod gig;
mod record;

pub use bid::{Bid, BidStatus};
pub use gig::{Gig, GigPatch, GigStatus, NewGig};
pub use record::{Collection, Entity, Record};
