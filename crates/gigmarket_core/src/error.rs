//! Error types.
//!
//! Two layers:
//! - [`CoreError`]: store, log and storage failures
//! - [`MarketError`]: the caller-facing taxonomy of marketplace operations

use crate::entity::{EntityId, UserId};
use crate::model::{Collection, GigStatus};
use gigmarket_storage::StorageError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for store operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type for marketplace operations.
pub type MarketResult<T> = Result<T, MarketError>;

/// Errors raised by the entity store and the write-ahead log.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error outside the storage backend (directory, lock file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record could not be encoded.
    #[error("encode error: {message}")]
    Encode {
        /// Description of the failure.
        message: String,
    },

    /// A stored record could not be decoded.
    #[error("decode error: {message}")]
    Decode {
        /// Description of the failure.
        message: String,
    },

    /// The log contains bytes that are not a valid record.
    #[error("log corruption at offset {offset}: {message}")]
    LogCorruption {
        /// Offset of the bad record.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// A log record failed its checksum.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the bad record.
        offset: u64,
        /// Checksum stored in the record.
        expected: u32,
        /// Checksum computed over the record.
        actual: u32,
    },

    /// A lock could not be acquired within the caller's timeout.
    #[error("store lock not acquired within {timeout:?}")]
    LockTimeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// Something the transaction read was changed by a concurrent commit.
    #[error("write conflict on {key}")]
    WriteConflict {
        /// The read that went stale.
        key: String,
    },

    /// A commit precondition did not hold at commit time.
    #[error("precondition failed: gig {gig} expected {expected}, found {actual:?}")]
    PreconditionFailed {
        /// The gig the precondition was on.
        gig: EntityId,
        /// The status the transaction required.
        expected: GigStatus,
        /// The status found, `None` if the gig does not exist.
        actual: Option<GigStatus>,
    },

    /// An insert collided with a unique index.
    #[error("unique index {index} already holds {key}")]
    UniqueViolation {
        /// Name of the index.
        index: &'static str,
        /// The duplicated key.
        key: String,
    },

    /// The directory is held by another process.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// The store has been closed.
    #[error("store is closed")]
    StoreClosed,

    /// A failed commit could not be rolled back out of the log. Commits are
    /// refused until the store is reopened.
    #[error("log rollback failed, reopen the store")]
    LogPoisoned,

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a log corruption error.
    pub fn log_corruption(offset: u64, message: impl Into<String>) -> Self {
        Self::LogCorruption {
            offset,
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}

/// Errors returned by marketplace operations.
///
/// All kinds are reported verbatim. Only [`MarketError::TransactionFailed`]
/// may be retried automatically: it is returned only when nothing from the
/// failed call became visible.
#[derive(Debug, Error)]
pub enum MarketError {
    /// The referenced gig or bid does not exist.
    #[error("{collection} {id} not found")]
    NotFound {
        /// What was looked up.
        collection: Collection,
        /// The missing ID.
        id: EntityId,
    },

    /// The caller is not the owner of the gig.
    #[error("{requester} is not the owner of gig {gig}")]
    Forbidden {
        /// The gig.
        gig: EntityId,
        /// The caller.
        requester: UserId,
    },

    /// A gig owner tried to bid on their own gig.
    #[error("{owner} owns gig {gig} and cannot bid on it")]
    OwnerCannotBid {
        /// The gig.
        gig: EntityId,
        /// The owner.
        owner: UserId,
    },

    /// The freelancer already has a bid on the gig.
    #[error("{freelancer} already has a bid on gig {gig}")]
    DuplicateBid {
        /// The gig.
        gig: EntityId,
        /// The freelancer.
        freelancer: UserId,
    },

    /// Input failed validation.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// What was wrong.
        message: String,
    },

    /// The gig is no longer open.
    #[error("gig {gig} has already been assigned")]
    GigAlreadyAssigned {
        /// The gig.
        gig: EntityId,
    },

    /// The store failed while executing the operation; nothing was applied.
    #[error("transaction failed: {source}")]
    TransactionFailed {
        /// The underlying store error.
        #[source]
        source: CoreError,
    },
}

impl MarketError {
    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a not-found error for a gig.
    #[must_use]
    pub fn gig_not_found(id: EntityId) -> Self {
        Self::NotFound {
            collection: Collection::Gigs,
            id,
        }
    }

    /// Creates a not-found error for a bid.
    #[must_use]
    pub fn bid_not_found(id: EntityId) -> Self {
        Self::NotFound {
            collection: Collection::Bids,
            id,
        }
    }

    /// Whether the caller may retry the same call unchanged.
    ///
    /// True for transient store failures: storage I/O, lock timeouts and
    /// write conflicts. A closed, poisoned or corrupt store is not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransactionFailed {
                source: CoreError::Storage(_)
                    | CoreError::Io(_)
                    | CoreError::LockTimeout { .. }
                    | CoreError::WriteConflict { .. }
            }
        )
    }
}

impl From<CoreError> for MarketError {
    fn from(source: CoreError) -> Self {
        Self::TransactionFailed { source }
    }
}
