//! Fault injection for crash and failure tests.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct FaultState {
    /// `Some(n)`: n more appends succeed, then every append fails.
    appends_left: Option<u64>,
    fail_flush: bool,
    fail_truncate: bool,
    injected: u64,
}

/// Shared control handle for a [`FaultyBackend`].
///
/// The switch is cloned into the test while the backend is moved into the
/// store, so faults can be armed at the exact point a test cares about.
#[derive(Debug, Clone, Default)]
pub struct FaultSwitch {
    state: Arc<Mutex<FaultState>>,
}

impl FaultSwitch {
    /// Creates a disarmed switch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `n` more appends through, then fails every append until disarmed.
    pub fn fail_after_appends(&self, n: u64) {
        self.state.lock().appends_left = Some(n);
    }

    /// Fails every flush and sync until disarmed.
    pub fn fail_flushes(&self) {
        self.state.lock().fail_flush = true;
    }

    /// Fails every truncate until disarmed.
    pub fn fail_truncates(&self) {
        self.state.lock().fail_truncate = true;
    }

    /// Clears every armed fault.
    pub fn disarm(&self) {
        let mut state = self.state.lock();
        state.appends_left = None;
        state.fail_flush = false;
        state.fail_truncate = false;
    }

    /// Number of operations failed so far.
    #[must_use]
    pub fn injected(&self) -> u64 {
        self.state.lock().injected
    }

    fn check_append(&self) -> StorageResult<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match state.appends_left {
            Some(0) => {
                state.injected += 1;
                Err(StorageError::InjectedFault { operation: "append" })
            }
            Some(ref mut left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn check_flush(&self, operation: &'static str) -> StorageResult<()> {
        let mut state = self.state.lock();
        if state.fail_flush {
            state.injected += 1;
            return Err(StorageError::InjectedFault { operation });
        }
        Ok(())
    }

    fn check_truncate(&self) -> StorageResult<()> {
        let mut state = self.state.lock();
        if state.fail_truncate {
            state.injected += 1;
            return Err(StorageError::InjectedFault {
                operation: "truncate",
            });
        }
        Ok(())
    }
}

/// A backend that delegates to `B` unless its [`FaultSwitch`] says otherwise.
///
/// Reads and size queries are never failed. Truncation only fails when
/// [`FaultSwitch::fail_truncates`] is armed.
#[derive(Debug)]
pub struct FaultyBackend<B> {
    inner: B,
    switch: FaultSwitch,
}

impl<B: StorageBackend> FaultyBackend<B> {
    /// Wraps `inner`, controlled by `switch`.
    pub fn new(inner: B, switch: FaultSwitch) -> Self {
        Self { inner, switch }
    }

    /// Returns the wrapped backend.
    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<B: StorageBackend> StorageBackend for FaultyBackend<B> {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        self.switch.check_append()?;
        self.inner.append(data)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.switch.check_flush("flush")?;
        self.inner.flush()
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.switch.check_flush("sync")?;
        self.inner.sync()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.switch.check_truncate()?;
        self.inner.truncate(new_size)
    }
}
