//! Store and marketplace configuration.

use std::time::Duration;

/// Configuration for opening a [`crate::Marketplace`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to sync the log to disk on every commit.
    pub sync_on_commit: bool,

    /// Default bound on every store interaction of an operation.
    pub store_timeout: Duration,

    /// Maximum length of a bid message, in characters.
    pub max_message_len: usize,

    /// How many times an operation is re-run after a write conflict.
    pub max_conflict_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
            store_timeout: Duration::from_secs(5),
            max_message_len: 1000,
            max_conflict_retries: 3,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync the log on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the default store timeout.
    #[must_use]
    pub const fn store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Sets the maximum bid message length.
    #[must_use]
    pub const fn max_message_len(mut self, len: usize) -> Self {
        self.max_message_len = len;
        self
    }

    /// Sets the conflict retry bound.
    #[must_use]
    pub const fn max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }
}
