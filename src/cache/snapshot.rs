//! Process-local cache snapshot
//!
//! Snapshots are immutable once built; the cache service replaces them
//! wholesale through an atomic pointer swap.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use crate::data::Dataset;

/// In-memory copy of the last known payload
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Serialized dataset, byte-identical to the durable tier
    pub raw: Bytes,
    /// Decoded form, attached lazily on first structured read
    pub parsed: Option<Arc<Dataset>>,
    pub etag: String,
    /// Local expiry, always ahead of the durable entry's expiry
    pub expires_at: Instant,
}

impl Snapshot {
    pub fn new(raw: Bytes, etag: String, parsed: Option<Arc<Dataset>>, ttl: Duration) -> Self {
        Self {
            raw,
            parsed,
            etag,
            expires_at: Instant::now() + ttl,
        }
    }

    /// Whether the snapshot may still be served without consulting the store
    pub fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }

    /// Same bytes and expiry with a decoded dataset attached
    pub fn with_parsed(&self, parsed: Arc<Dataset>) -> Self {
        Self {
            raw: self.raw.clone(),
            parsed: Some(parsed),
            etag: self.etag.clone(),
            expires_at: self.expires_at,
        }
    }

    /// Whether `raw` is the very buffer this snapshot holds
    pub(crate) fn holds(&self, raw: &Bytes) -> bool {
        self.raw.as_ptr() == raw.as_ptr() && self.raw.len() == raw.len()
    }
}

/// Derives the process-local TTL from the durable TTL
///
/// The local copy expires `margin` earlier than the durable entry so the
/// process never trusts a store entry that has already lapsed server-side.
/// When the margin would leave nothing (`durable <= margin`) the full
/// durable TTL is used instead.
pub fn process_ttl(durable: Duration, margin: Duration) -> Duration {
    match durable.checked_sub(margin) {
        Some(ttl) if !ttl.is_zero() => ttl,
        _ => durable,
    }
}
