//! Cache timing configuration.

use std::time::Duration;

use super::snapshot::process_ttl;

/// TTL of the durable entry, applied on every write
pub const DURABLE_TTL: Duration = Duration::from_secs(60);

/// How much earlier the process snapshot expires than the durable entry
pub const SAFETY_MARGIN: Duration = Duration::from_secs(5);

/// Upper bound for a single durable store operation
pub const STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for the health-check ping
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub durable_ttl: Duration,
    pub safety_margin: Duration,
    pub health_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            durable_ttl: DURABLE_TTL,
            safety_margin: SAFETY_MARGIN,
            health_timeout: HEALTH_TIMEOUT,
        }
    }
}

impl CacheConfig {
    /// TTL given to process snapshots
    pub fn process_ttl(&self) -> Duration {
        process_ttl(self.durable_ttl, self.safety_margin)
    }
}
