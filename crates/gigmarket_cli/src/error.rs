//! CLI usage errors.

use thiserror::Error;

/// Errors raised by the CLI itself, before or after talking to the store.
#[derive(Debug, Error)]
pub enum CliError {
    /// `--path` is missing.
    #[error("--path is required for {0}")]
    PathRequired(&'static str),

    /// `--as` is missing.
    #[error("--as <USER> is required to {0}")]
    IdentityRequired(&'static str),

    /// An ID argument is not a UUID.
    #[error("invalid id {value:?}: {reason}")]
    InvalidId {
        /// The argument.
        value: String,
        /// Why it failed to parse.
        reason: String,
    },

    /// An amount argument is malformed.
    #[error("invalid amount {value:?}: {reason}")]
    InvalidAmount {
        /// The argument.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// `verify` found broken invariants.
    #[error("{0} integrity violation(s) found")]
    IntegrityViolations(usize),
}
