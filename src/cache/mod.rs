//! Two-tier payload cache
//!
//! A process-local snapshot sits in front of a shared durable store. The
//! service in [`service`] coordinates both tiers with the upstream feed.

mod config;
mod entry;
mod service;
mod snapshot;
mod store;

pub use config::{CacheConfig, DURABLE_TTL, HEALTH_TIMEOUT, SAFETY_MARGIN, STORE_TIMEOUT};
pub use entry::CacheEntry;
pub use service::{Health, SosCache, SosError};
pub use snapshot::{process_ttl, Snapshot};
pub use store::{DurableStore, MemoryStore, RedisStore, StoreError, CACHE_KEY};
