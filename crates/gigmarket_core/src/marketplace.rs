//! Marketplace facade.

use crate::config::Config;
use crate::dir::StoreDir;
use crate::entity::{EntityId, UserId};
use crate::error::{CoreResult, MarketResult};
use crate::market::{
    admission, gigs, hire, integrity, query, BidWithGig, GigFilter, HireOutcome, IntegrityReport,
    OpContext, SubmitBid,
};
use crate::model::{Bid, BidStatus, Gig, GigPatch, GigStatus, NewGig};
use crate::store::EntityStore;
use gigmarket_storage::{FileBackend, InMemoryBackend, StorageBackend};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Counts over the committed state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarketStats {
    /// All gigs.
    pub gigs: usize,
    /// Gigs still open.
    pub open_gigs: usize,
    /// Gigs with a hire.
    pub assigned_gigs: usize,
    /// All bids.
    pub bids: usize,
    /// Bids awaiting a decision.
    pub pending_bids: usize,
    /// Hired bids.
    pub hired_bids: usize,
    /// Rejected bids.
    pub rejected_bids: usize,
    /// Sequence of the latest commit.
    pub committed_seq: u64,
    /// Size of the write-ahead log in bytes.
    pub log_bytes: u64,
}

/// The entry point of the marketplace.
///
/// Every operation takes the caller's identity explicitly. Each has a form
/// bounded by [`Config::store_timeout`] and a `*_within` form taking the
/// caller's own timeout.
///
/// ```rust
/// use gigmarket_core::{GigFilter, Marketplace, NewGig, UserId};
///
/// let market = Marketplace::open_in_memory().unwrap();
/// market
///     .create_gig(&UserId::new("client"), NewGig::new("Build a web site", "React", 900))
///     .unwrap();
/// let found = market.list_gigs(&GigFilter::new().search("WEB")).unwrap();
/// assert_eq!(found.len(), 1);
/// ```
pub struct Marketplace {
    store: EntityStore,
    config: Config,
    /// Holds the directory lock; `None` for stores not on disk.
    _dir: Option<StoreDir>,
}

impl Marketplace {
    /// Opens the store in directory `path` with the default configuration.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens the store in directory `path`.
    ///
    /// # Errors
    ///
    /// - `StoreLocked` if another process has the directory open
    /// - `LogCorruption` / `ChecksumMismatch` if the log cannot be replayed
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;
        let backend = FileBackend::open(&dir.log_path())?;
        let store = EntityStore::open(Box::new(backend), config.sync_on_commit)?;
        info!(
            path = %path.display(),
            committed = %store.committed_seq(),
            "marketplace opened"
        );
        Ok(Self {
            store,
            config,
            _dir: Some(dir),
        })
    }

    /// Opens a store over any backend.
    pub fn open_with_backend(config: Config, backend: Box<dyn StorageBackend>) -> CoreResult<Self> {
        let store = EntityStore::open(backend, config.sync_on_commit)?;
        Ok(Self {
            store,
            config,
            _dir: None,
        })
    }

    /// Opens an empty store that lives in memory.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_with_backend(Config::default(), Box::new(InMemoryBackend::new()))
    }

    /// The configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying entity store.
    #[must_use]
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    fn ctx(&self, timeout: Duration) -> OpContext<'_> {
        OpContext {
            store: &self.store,
            config: &self.config,
            timeout,
        }
    }

    fn default_ctx(&self) -> OpContext<'_> {
        self.ctx(self.config.store_timeout)
    }

    /// Posts a gig owned by `owner`.
    pub fn create_gig(&self, owner: &UserId, fields: NewGig) -> MarketResult<Gig> {
        gigs::create_gig(&self.default_ctx(), owner, fields)
    }

    /// [`Marketplace::create_gig`] bounded by `timeout`.
    pub fn create_gig_within(
        &self,
        owner: &UserId,
        fields: NewGig,
        timeout: Duration,
    ) -> MarketResult<Gig> {
        gigs::create_gig(&self.ctx(timeout), owner, fields)
    }

    /// Loads a gig.
    pub fn get_gig(&self, id: EntityId) -> MarketResult<Gig> {
        query::get_gig(&self.default_ctx(), id)
    }

    /// [`Marketplace::get_gig`] bounded by `timeout`.
    pub fn get_gig_within(&self, id: EntityId, timeout: Duration) -> MarketResult<Gig> {
        query::get_gig(&self.ctx(timeout), id)
    }

    /// Changes descriptive fields of an open gig. Owner only.
    pub fn update_gig(
        &self,
        id: EntityId,
        requester: &UserId,
        patch: GigPatch,
    ) -> MarketResult<Gig> {
        gigs::update_gig(&self.default_ctx(), id, requester, &patch)
    }

    /// [`Marketplace::update_gig`] bounded by `timeout`.
    pub fn update_gig_within(
        &self,
        id: EntityId,
        requester: &UserId,
        patch: GigPatch,
        timeout: Duration,
    ) -> MarketResult<Gig> {
        gigs::update_gig(&self.ctx(timeout), id, requester, &patch)
    }

    /// Submits a bid through the admission gate.
    pub fn submit_bid(&self, request: SubmitBid) -> MarketResult<Bid> {
        admission::submit_bid(&self.default_ctx(), &request)
    }

    /// [`Marketplace::submit_bid`] bounded by `timeout`.
    pub fn submit_bid_within(&self, request: SubmitBid, timeout: Duration) -> MarketResult<Bid> {
        admission::submit_bid(&self.ctx(timeout), &request)
    }

    /// Hires a bid. Only the gig owner may hire, and only once per gig.
    pub fn hire(&self, bid: EntityId, requester: &UserId) -> MarketResult<HireOutcome> {
        hire::hire(&self.default_ctx(), bid, requester)
    }

    /// [`Marketplace::hire`] bounded by `timeout`.
    pub fn hire_within(
        &self,
        bid: EntityId,
        requester: &UserId,
        timeout: Duration,
    ) -> MarketResult<HireOutcome> {
        hire::hire(&self.ctx(timeout), bid, requester)
    }

    /// Lists gigs matching `filter`.
    pub fn list_gigs(&self, filter: &GigFilter) -> MarketResult<Vec<Gig>> {
        query::list_gigs(&self.default_ctx(), filter)
    }

    /// [`Marketplace::list_gigs`] bounded by `timeout`.
    pub fn list_gigs_within(&self, filter: &GigFilter, timeout: Duration) -> MarketResult<Vec<Gig>> {
        query::list_gigs(&self.ctx(timeout), filter)
    }

    /// Lists the bids on a gig. Owner only.
    pub fn list_bids_for_gig(&self, gig: EntityId, requester: &UserId) -> MarketResult<Vec<Bid>> {
        query::list_bids_for_gig(&self.default_ctx(), gig, requester)
    }

    /// [`Marketplace::list_bids_for_gig`] bounded by `timeout`.
    pub fn list_bids_for_gig_within(
        &self,
        gig: EntityId,
        requester: &UserId,
        timeout: Duration,
    ) -> MarketResult<Vec<Bid>> {
        query::list_bids_for_gig(&self.ctx(timeout), gig, requester)
    }

    /// Lists a freelancer's bids with their gigs.
    pub fn list_my_bids(&self, freelancer: &UserId) -> MarketResult<Vec<BidWithGig>> {
        query::list_my_bids(&self.default_ctx(), freelancer)
    }

    /// [`Marketplace::list_my_bids`] bounded by `timeout`.
    pub fn list_my_bids_within(
        &self,
        freelancer: &UserId,
        timeout: Duration,
    ) -> MarketResult<Vec<BidWithGig>> {
        query::list_my_bids(&self.ctx(timeout), freelancer)
    }

    /// Checks every gig and bid against the marketplace invariants.
    pub fn verify(&self) -> MarketResult<IntegrityReport> {
        integrity::verify(&self.default_ctx())
    }

    /// [`Marketplace::verify`] bounded by `timeout`.
    pub fn verify_within(&self, timeout: Duration) -> MarketResult<IntegrityReport> {
        integrity::verify(&self.ctx(timeout))
    }

    /// Counts gigs and bids by status.
    pub fn stats(&self) -> MarketResult<MarketStats> {
        let timeout = self.config.store_timeout;
        let mut stats = self.store.read(timeout, |state| {
            let mut stats = MarketStats {
                gigs: state.gig_count(),
                bids: state.bid_count(),
                committed_seq: state.committed_seq().as_u64(),
                ..MarketStats::default()
            };
            for gig in state.gigs() {
                match gig.value.status {
                    GigStatus::Open => stats.open_gigs += 1,
                    GigStatus::Assigned => stats.assigned_gigs += 1,
                }
            }
            for bid in state.bids() {
                match bid.value.status {
                    BidStatus::Pending => stats.pending_bids += 1,
                    BidStatus::Hired => stats.hired_bids += 1,
                    BidStatus::Rejected => stats.rejected_bids += 1,
                }
            }
            stats
        })?;
        stats.log_bytes = self.store.log().size()?;
        Ok(stats)
    }

    /// Flushes the log to disk.
    pub fn flush(&self) -> CoreResult<()> {
        self.store.log().flush()?;
        self.store.log().sync()
    }

    /// Flushes and closes the store. Later operations fail with `StoreClosed`.
    pub fn close(&self) -> CoreResult<()> {
        self.store.close()
    }
}

impl std::fmt::Debug for Marketplace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Marketplace")
            .field("config", &self.config)
            .field("committed_seq", &self.store.committed_seq())
            .field("on_disk", &self._dir.is_some())
            .finish()
    }
}
