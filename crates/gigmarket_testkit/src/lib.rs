//! # gigmarket testkit
//!
//! Test utilities for gigmarket.
//!
//! This crate provides:
//! - Test markets over memory, files, and fault-injecting backends
//! - Seeding helpers for common scenarios
//! - Invariant assertions and state snapshots
//! - A thread-based race harness for hires and bid submissions
//! - Property-based generators using proptest
//!
//! The cross-crate integration tests live in this crate's `tests/` directory.
//!
//! ## Usage
//!
//! ```rust
//! use gigmarket_testkit::prelude::*;
//!
//! let market = TestMarket::memory();
//! let scenario = seed_gig_with_bids(&market, 3);
//! market.hire(scenario.bids[0].id, &scenario.owner).unwrap();
//! assert_invariants(&market);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod invariants;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::invariants::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use invariants::*;
pub use stress::*;
