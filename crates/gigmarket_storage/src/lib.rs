//! # gigmarket storage
//!
//! Byte-level storage for the gigmarket write-ahead log.
//!
//! Backends are opaque append-only byte stores. They know nothing about log
//! records, gigs or bids; `gigmarket_core` owns every format decision.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - shared in-process buffer, used by tests and ephemeral stores
//! - [`FileBackend`] - a single OS file
//! - [`FaultyBackend`] - wraps another backend and fails on demand via a [`FaultSwitch`]
//!
//! ## Example
//!
//! ```rust
//! use gigmarket_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"gig").unwrap();
//! assert_eq!(backend.read_at(offset, 3).unwrap(), b"gig");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod faulty;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use faulty::{FaultSwitch, FaultyBackend};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
