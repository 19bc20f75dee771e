//! # gigmarket core
//!
//! An embedded store for a gig marketplace: clients post gigs, freelancers
//! bid on them, and the gig owner hires exactly one bid.
//!
//! This crate provides:
//! - A write-ahead log over a [`gigmarket_storage::StorageBackend`]
//! - An entity store with versioned records, a unique `(gig, freelancer)`
//!   index and optimistic transactions validated at commit time
//! - The bid admission gate, the hire coordinator and the listing queries
//! - [`Marketplace`], the facade every caller goes through
//!
//! ## Hiring
//!
//! A hire marks the gig ASSIGNED, the chosen bid HIRED and every other
//! pending bid of the gig REJECTED in one commit. The commit carries a
//! compare-and-swap precondition on the gig status, so of two racing hires
//! exactly one wins:
//!
//! ```rust
//! use gigmarket_core::{GigStatus, Marketplace, NewGig, SubmitBid, UserId};
//!
//! let market = Marketplace::open_in_memory().unwrap();
//! let client = UserId::new("client");
//! let gig = market
//!     .create_gig(&client, NewGig::new("Build a web site", "Landing page", 50_000))
//!     .unwrap();
//! let bid = market
//!     .submit_bid(SubmitBid::new(gig.id, UserId::new("ada"), "I can do it", 45_000))
//!     .unwrap();
//!
//! let hired = market.hire(bid.id, &client).unwrap();
//! assert_eq!(hired.gig.status, GigStatus::Assigned);
//! assert!(market.hire(bid.id, &client).is_err());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod entity;
mod error;
mod market;
mod marketplace;
mod model;
mod store;
mod types;
mod wal;

pub use config::Config;
pub use dir::StoreDir;
pub use entity::{EntityId, UserId};
pub use error::{CoreError, CoreResult, MarketError, MarketResult};
pub use market::{
    BidWithGig, GigFilter, HireOutcome, IntegrityReport, SubmitBid, Violation,
};
pub use marketplace::{MarketStats, Marketplace};
pub use model::{
    Bid, BidStatus, Collection, Entity, Gig, GigPatch, GigStatus, NewGig, Record,
};
pub use store::{EntityStore, Precondition, ReadKey, Transaction, WriteKind};
pub use types::{now_millis, SequenceNumber, TransactionId};
pub use wal::{compute_crc32, LogRecord, LogRecordType, WriteAheadLog};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
