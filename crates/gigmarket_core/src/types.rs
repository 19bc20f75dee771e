//! Core type definitions.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of a store transaction.
///
/// Monotonically increasing within one process lifetime and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Commit sequence number.
///
/// Every successful commit gets the next sequence number. A record's version
/// is the sequence of the last commit that wrote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// Creates a sequence number.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the following sequence number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

/// Wall-clock milliseconds since the Unix epoch.
///
/// Informative only; ordering inside the store uses commit sequences.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_next_and_order() {
        let s = SequenceNumber::new(41);
        assert_eq!(s.next().as_u64(), 42);
        assert!(s < s.next());
    }

    #[test]
    fn display_forms() {
        assert_eq!(TransactionId::new(7).to_string(), "txn:7");
        assert_eq!(SequenceNumber::new(3).to_string(), "seq:3");
    }

    #[test]
    fn clock_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }
}
