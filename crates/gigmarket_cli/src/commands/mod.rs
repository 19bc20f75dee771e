//! CLI command implementations.

pub mod bid;
pub mod dump_log;
pub mod gig;
pub mod hire;
pub mod stats;
pub mod verify;

use crate::error::CliError;
use crate::output::Format;
use gigmarket_core::{Config, EntityId, Marketplace, UserId};
use std::path::Path;
use std::time::Duration;

/// An open store plus the caller's global flags.
pub struct Session {
    pub market: Marketplace,
    pub user: Option<UserId>,
    pub timeout: Duration,
    pub format: Format,
}

impl Session {
    /// Opens the store in `path`.
    pub fn open(
        path: &Path,
        user: Option<String>,
        timeout_ms: u64,
        format: Format,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let timeout = Duration::from_millis(timeout_ms);
        let config = Config::new().store_timeout(timeout);
        let market = Marketplace::open_with_config(path, config)?;
        Ok(Self {
            market,
            user: user.map(UserId::new),
            timeout,
            format,
        })
    }

    /// The caller, required for `action`.
    pub fn user(&self, action: &'static str) -> Result<&UserId, CliError> {
        self.user.as_ref().ok_or(CliError::IdentityRequired(action))
    }

    pub fn close(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.market.close()?;
        Ok(())
    }
}

pub fn parse_id(value: &str) -> Result<EntityId, CliError> {
    value.trim().parse::<EntityId>().map_err(|e| CliError::InvalidId {
        value: value.to_string(),
        reason: e.to_string(),
    })
}
