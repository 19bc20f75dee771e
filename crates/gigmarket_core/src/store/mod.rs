//! Entity store: committed state, indexes and optimistic transactions.

mod index;
mod manager;
mod state;
mod transaction;

pub use manager::EntityStore;
pub(crate) use state::{StoreState, Versioned};
#[cfg(test)]
pub(crate) use transaction::PendingWrite;
pub use transaction::{Precondition, ReadKey, Transaction, WriteKind};
