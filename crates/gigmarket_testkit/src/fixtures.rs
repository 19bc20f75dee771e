//! Test fixtures and marketplace helpers.
//!
//! Provides convenience functions for setting up test markets and common
//! test scenarios.

use gigmarket_core::{Bid, Config, Gig, Marketplace, NewGig, SubmitBid, UserId};
use gigmarket_storage::{
    FaultSwitch, FaultyBackend, InMemoryBackend, StorageBackend, StorageResult,
};
use parking_lot::{Condvar, Mutex};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Where a [`TestMarket`] keeps its log.
enum Medium {
    Memory(InMemoryBackend),
    File(TempDir),
}

/// A test marketplace with automatic cleanup.
///
/// Memory-backed markets keep a handle on the log bytes and file-backed ones
/// keep their temporary directory, so both can be reopened to test recovery.
pub struct TestMarket {
    /// The marketplace instance.
    pub market: Marketplace,
    /// The fault switch, for markets created with [`TestMarket::faulty`].
    pub faults: Option<FaultSwitch>,
    /// The stall switch, for markets created with [`TestMarket::stalling`].
    pub stalls: Option<StallSwitch>,
    config: Config,
    medium: Medium,
}

impl TestMarket {
    /// Creates a new in-memory test market.
    pub fn memory() -> Self {
        Self::memory_with_config(test_config())
    }

    /// Creates an in-memory test market with `config`.
    pub fn memory_with_config(config: Config) -> Self {
        let backend = InMemoryBackend::new();
        let market = Marketplace::open_with_backend(config.clone(), Box::new(backend.clone()))
            .expect("Failed to open in-memory market");
        Self {
            market,
            faults: None,
            stalls: None,
            config,
            medium: Medium::Memory(backend),
        }
    }

    /// Creates a new test market in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = test_config();
        let market = Marketplace::open_with_config(temp_dir.path(), config.clone())
            .expect("Failed to open file market");
        Self {
            market,
            faults: None,
            stalls: None,
            config,
            medium: Medium::File(temp_dir),
        }
    }

    /// Creates an in-memory test market whose log can be made to fail.
    ///
    /// The switch starts disarmed.
    pub fn faulty() -> Self {
        let backend = InMemoryBackend::new();
        let switch = FaultSwitch::new();
        let config = test_config();
        let market = Marketplace::open_with_backend(
            config.clone(),
            Box::new(FaultyBackend::new(backend.clone(), switch.clone())),
        )
        .expect("Failed to open faulty market");
        Self {
            market,
            faults: Some(switch),
            stalls: None,
            config,
            medium: Medium::Memory(backend),
        }
    }

    /// Creates an in-memory test market whose log appends can be held open.
    pub fn stalling() -> Self {
        Self::stalling_with_config(test_config())
    }

    /// Like [`TestMarket::stalling`] with a custom configuration.
    pub fn stalling_with_config(config: Config) -> Self {
        let backend = InMemoryBackend::new();
        let switch = StallSwitch::new();
        let market = Marketplace::open_with_backend(
            config.clone(),
            Box::new(StallingBackend::new(backend.clone(), switch.clone())),
        )
        .expect("Failed to open stalling market");
        Self {
            market,
            faults: None,
            stalls: Some(switch),
            config,
            medium: Medium::Memory(backend),
        }
    }

    /// The fault switch. Panics unless created with [`TestMarket::faulty`].
    pub fn fault_switch(&self) -> &FaultSwitch {
        self.faults.as_ref().expect("Not a faulty market")
    }

    /// The stall switch. Panics unless created with [`TestMarket::stalling`].
    pub fn stall_switch(&self) -> &StallSwitch {
        self.stalls.as_ref().expect("Not a stalling market")
    }

    /// Returns the store directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        match &self.medium {
            Medium::File(dir) => Some(dir.path()),
            Medium::Memory(_) => None,
        }
    }

    /// Drops the marketplace without closing it and opens a fresh one over
    /// the same log, as after a crash.
    ///
    /// Faults and stalls are not carried over.
    pub fn reopen(self) -> Self {
        let Self {
            market,
            config,
            medium,
            ..
        } = self;
        drop(market);

        let market = match &medium {
            Medium::Memory(backend) => {
                Marketplace::open_with_backend(config.clone(), Box::new(backend.clone()))
            }
            Medium::File(dir) => Marketplace::open_with_config(dir.path(), config.clone()),
        }
        .expect("Failed to reopen market");

        Self {
            market,
            faults: None,
            stalls: None,
            config,
            medium,
        }
    }

    /// Raw log bytes, for memory-backed markets.
    pub fn log_bytes(&self) -> Option<Vec<u8>> {
        match &self.medium {
            Medium::Memory(backend) => Some(backend.snapshot()),
            Medium::File(_) => None,
        }
    }
}

impl std::ops::Deref for TestMarket {
    type Target = Marketplace;

    fn deref(&self) -> &Self::Target {
        &self.market
    }
}

/// Configuration used by test markets: no fsync, short timeout.
pub fn test_config() -> Config {
    Config::new()
        .sync_on_commit(false)
        .store_timeout(Duration::from_secs(2))
}

/// Runs a test with a temporary in-memory market.
///
/// # Example
///
/// ```rust
/// use gigmarket_testkit::with_memory_market;
/// use gigmarket_core::GigFilter;
///
/// with_memory_market(|market| {
///     assert!(market.list_gigs(&GigFilter::new()).unwrap().is_empty());
/// });
/// ```
pub fn with_memory_market<F, R>(f: F) -> R
where
    F: FnOnce(&Marketplace) -> R,
{
    let test_market = TestMarket::memory();
    f(&test_market.market)
}

/// Runs a test with a temporary file-based market.
pub fn with_file_market<F, R>(f: F) -> R
where
    F: FnOnce(&Marketplace, &Path) -> R,
{
    let test_market = TestMarket::file();
    let path = test_market
        .path()
        .expect("File market should have a path")
        .to_path_buf();
    f(&test_market.market, &path)
}

/// The client that owns seeded gigs.
pub fn client() -> UserId {
    UserId::new("client")
}

/// The `i`-th seeded freelancer.
pub fn freelancer(i: usize) -> UserId {
    UserId::new(format!("freelancer-{i}"))
}

/// A gig and the bids seeded on it.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// The gig's owner.
    pub owner: UserId,
    /// The gig as created.
    pub gig: Gig,
    /// The bids as submitted, oldest first.
    pub bids: Vec<Bid>,
}

impl Scenario {
    /// Freelancer of the `i`-th bid.
    pub fn bidder(&self, i: usize) -> &UserId {
        &self.bids[i].freelancer
    }
}

/// Creates a gig owned by [`client`].
pub fn seed_gig(market: &Marketplace, title: &str) -> Gig {
    market
        .create_gig(&client(), NewGig::new(title, format!("{title} details"), 1_000))
        .expect("Failed to create gig")
}

/// Creates an open gig owned by [`client`] with `bids` pending bids from
/// distinct freelancers.
pub fn seed_gig_with_bids(market: &Marketplace, bids: usize) -> Scenario {
    seed_gig_with_bids_from(market, &client(), "Build a web site", bids)
}

/// Like [`seed_gig_with_bids`] with an explicit owner and title.
pub fn seed_gig_with_bids_from(
    market: &Marketplace,
    owner: &UserId,
    title: &str,
    bids: usize,
) -> Scenario {
    let gig = market
        .create_gig(owner, NewGig::new(title, format!("{title} details"), 1_000))
        .expect("Failed to create gig");
    let bids = (0..bids)
        .map(|i| {
            market
                .submit_bid(SubmitBid::new(
                    gig.id,
                    freelancer(i),
                    format!("proposal {i}"),
                    100 + i as u64,
                ))
                .expect("Failed to submit bid")
        })
        .collect();
    Scenario {
        owner: owner.clone(),
        gig,
        bids,
    }
}

#[derive(Debug, Default)]
struct StallState {
    armed: bool,
    stalled: bool,
}

/// Control handle for a [`StallingBackend`].
///
/// While armed, the next append blocks inside the backend, and so inside
/// the committing transaction, until [`StallSwitch::release`].
#[derive(Debug, Clone, Default)]
pub struct StallSwitch {
    state: Arc<(Mutex<StallState>, Condvar)>,
}

impl StallSwitch {
    /// Creates a disarmed switch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next append block.
    pub fn arm(&self) {
        self.state.0.lock().armed = true;
    }

    /// Unblocks a stalled append and disarms the switch.
    pub fn release(&self) {
        let (lock, cvar) = &*self.state;
        lock.lock().armed = false;
        cvar.notify_all();
    }

    /// Waits until an append is blocked. Returns false on timeout.
    pub fn wait_until_stalled(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.state;
        let mut state = lock.lock();
        while !state.stalled {
            if cvar.wait_for(&mut state, timeout).timed_out() {
                return state.stalled;
            }
        }
        true
    }

    fn pass(&self) {
        let (lock, cvar) = &*self.state;
        let mut state = lock.lock();
        if !state.armed {
            return;
        }
        state.stalled = true;
        cvar.notify_all();
        while state.armed {
            cvar.wait(&mut state);
        }
        state.stalled = false;
    }
}

/// A backend whose appends can be held open by a [`StallSwitch`].
#[derive(Debug)]
pub struct StallingBackend<B> {
    inner: B,
    switch: StallSwitch,
}

impl<B: StorageBackend> StallingBackend<B> {
    /// Wraps `inner`, controlled by `switch`.
    pub fn new(inner: B, switch: StallSwitch) -> Self {
        Self { inner, switch }
    }
}

impl<B: StorageBackend> StorageBackend for StallingBackend<B> {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        self.switch.pass();
        self.inner.append(data)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.inner.flush()
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.inner.sync()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gigmarket_core::{BidStatus, GigFilter, GigStatus};

    #[test]
    fn test_memory_market() {
        let market = TestMarket::memory();
        assert!(market.path().is_none());
        assert!(market.list_gigs(&GigFilter::new()).unwrap().is_empty());
    }

    #[test]
    fn test_file_market() {
        let market = TestMarket::file();
        let path = market.path().unwrap().to_path_buf();
        seed_gig(&market, "Logo");
        assert!(path.join("market.wal").exists());
    }

    #[test]
    fn test_seeded_scenario() {
        let market = TestMarket::memory();
        let scenario = seed_gig_with_bids(&market, 3);
        assert_eq!(scenario.gig.status, GigStatus::Open);
        assert_eq!(scenario.bids.len(), 3);
        assert!(scenario.bids.iter().all(|b| b.status == BidStatus::Pending));
        assert_eq!(scenario.bidder(2), &freelancer(2));
    }

    #[test]
    fn test_reopen_memory_market() {
        let market = TestMarket::memory();
        let scenario = seed_gig_with_bids(&market, 2);
        let market = market.reopen();
        assert_eq!(market.get_gig(scenario.gig.id).unwrap(), scenario.gig);
    }

    #[test]
    fn test_reopen_file_market() {
        let market = TestMarket::file();
        let gig = seed_gig(&market, "Logo");
        let market = market.reopen();
        assert_eq!(market.get_gig(gig.id).unwrap(), gig);
    }

    #[test]
    fn test_stall_switch_times_out_when_idle() {
        let switch = StallSwitch::new();
        assert!(!switch.wait_until_stalled(Duration::from_millis(10)));
    }

    #[test]
    fn test_with_file_market() {
        with_file_market(|market, path| {
            seed_gig(market, "Logo");
            assert!(path.exists());
        });
    }
}
