//! Identifiers for stored entities and callers.

mod id;

pub use id::{EntityId, UserId};
