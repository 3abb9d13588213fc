//! Two-tier cache over the upstream feed
//!
//! Reads are served from the process snapshot when fresh, then from the
//! durable store, and only on a full miss from upstream. Every cache-served
//! read opportunistically starts a background conditional refresh, of which
//! at most one runs at a time per `SosCache`.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::CacheConfig;
use super::entry::CacheEntry;
use super::snapshot::Snapshot;
use super::store::DurableStore;
use crate::data::{Dataset, FetchError, FetchOutcome, Fetcher};
use crate::refresh::SingleFlight;

/// Errors surfaced to consumers of the cache
#[derive(Debug, Error)]
pub enum SosError {
    /// Upstream could not be reached on a cold cache
    #[error(transparent)]
    Upstream(#[from] FetchError),

    /// The cached payload is not a valid dataset
    #[error("Failed to decode cached payload: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to encode dataset: {0}")]
    Encode(#[source] serde_json::Error),

    /// Upstream answered but there is nothing to serve
    #[error("no data returned from fetcher")]
    Empty,
}

/// Liveness of the durable tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Ok,
    Down,
}

/// Shared handle to the cache; clones refer to the same state
#[derive(Clone)]
pub struct SosCache {
    inner: Arc<Inner>,
}

struct Inner {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn DurableStore>,
    config: CacheConfig,
    snapshot: ArcSwapOption<Snapshot>,
    flight: SingleFlight,
}

impl SosCache {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn DurableStore>,
        config: CacheConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                store,
                config,
                snapshot: ArcSwapOption::empty(),
                flight: SingleFlight::new(),
            }),
        }
    }

    /// The current process snapshot, fresh or not
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.snapshot.load_full()
    }

    /// Entity tag of the current process snapshot
    pub fn current_etag(&self) -> Option<String> {
        self.inner
            .snapshot
            .load()
            .as_ref()
            .map(|snapshot| snapshot.etag.clone())
    }

    /// Whether a background refresh is running
    pub fn refresh_in_flight(&self) -> bool {
        self.inner.flight.in_flight()
    }

    /// Returns the serialized dataset
    ///
    /// # Behavior
    /// - Fresh process snapshot: returned immediately, background refresh started
    /// - Durable hit: snapshot rebuilt from it, background refresh started
    /// - Full miss: synchronous upstream fetch, both tiers written
    /// - Upstream failure after an earlier success: the last snapshot is
    ///   served even though it has expired
    pub async fn get_raw(&self) -> Result<Bytes, SosError> {
        if let Some(snapshot) = self.fresh_snapshot() {
            debug!(etag = %snapshot.etag, "Process cache hit");
            self.try_refresh(&snapshot.etag);
            return Ok(snapshot.raw.clone());
        }

        if let Some(snapshot) = self.load_durable().await {
            self.try_refresh(&snapshot.etag);
            return Ok(snapshot.raw.clone());
        }

        self.load_cold().await.map(|snapshot| snapshot.raw.clone())
    }

    /// Returns the decoded dataset
    ///
    /// Mirrors [`get_raw`](Self::get_raw); a dataset already decoded for the
    /// current snapshot is reused instead of decoding the bytes again.
    pub async fn get_dataset(&self) -> Result<Arc<Dataset>, SosError> {
        if let Some(snapshot) = self.fresh_snapshot() {
            if let Some(parsed) = &snapshot.parsed {
                debug!(etag = %snapshot.etag, "Process cache hit (parsed)");
                self.try_refresh(&snapshot.etag);
                return Ok(Arc::clone(parsed));
            }
        }

        let raw = self.get_raw().await?;
        if let Some(parsed) = self.parsed_for(&raw) {
            return Ok(parsed);
        }

        let dataset: Dataset = serde_json::from_slice(&raw).map_err(SosError::Decode)?;
        let dataset = Arc::new(dataset);
        self.attach_parsed(&raw, &dataset);
        Ok(dataset)
    }

    /// Starts a background conditional refresh unless one is running
    ///
    /// A call while another refresh is in flight is a no-op. Must be called
    /// from within a tokio runtime.
    ///
    /// # Returns
    /// * `Some(JoinHandle)` for the spawned refresh
    /// * `None` if a refresh was already in flight
    pub fn try_refresh(&self, etag: &str) -> Option<JoinHandle<()>> {
        let Some(guard) = self.inner.flight.try_acquire() else {
            debug!("Refresh already in flight, skipping");
            return None;
        };

        let cache = self.clone();
        let etag = etag.to_string();
        Some(tokio::spawn(async move {
            let _guard = guard;
            cache.revalidate(&etag).await;
        }))
    }

    /// Pings the durable store within the health timeout
    pub async fn health(&self) -> Health {
        let timeout = self.inner.config.health_timeout;
        match tokio::time::timeout(timeout, self.inner.store.ping()).await {
            Ok(Ok(())) => Health::Ok,
            Ok(Err(err)) => {
                warn!(error = %err, "Durable store ping failed");
                Health::Down
            }
            Err(_) => {
                warn!(?timeout, "Durable store ping timed out");
                Health::Down
            }
        }
    }

    fn fresh_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner
            .snapshot
            .load_full()
            .filter(|snapshot| snapshot.is_fresh())
    }

    fn parsed_for(&self, raw: &Bytes) -> Option<Arc<Dataset>> {
        let current = self.inner.snapshot.load();
        current
            .as_ref()
            .filter(|snapshot| snapshot.holds(raw))
            .and_then(|snapshot| snapshot.parsed.clone())
    }

    /// Attaches `dataset` to the snapshot holding `raw`
    ///
    /// Uses compare-and-swap so a snapshot written concurrently by a refresh
    /// is never replaced by an older one.
    fn attach_parsed(&self, raw: &Bytes, dataset: &Arc<Dataset>) {
        let current = self.inner.snapshot.load();
        let Some(snapshot) = current.as_ref() else {
            return;
        };
        if !snapshot.holds(raw) || snapshot.parsed.is_some() {
            return;
        }

        let updated = Arc::new(snapshot.with_parsed(Arc::clone(dataset)));
        self.inner.snapshot.compare_and_swap(&current, Some(updated));
    }

    fn install(&self, raw: Bytes, etag: String, parsed: Option<Arc<Dataset>>) -> Arc<Snapshot> {
        let snapshot = Arc::new(Snapshot::new(
            raw,
            etag,
            parsed,
            self.inner.config.process_ttl(),
        ));
        self.inner.snapshot.store(Some(Arc::clone(&snapshot)));
        snapshot
    }

    /// Writes both tiers; a durable write failure only leaves that tier behind
    async fn persist(&self, raw: Bytes, etag: String, parsed: Option<Arc<Dataset>>) -> Arc<Snapshot> {
        let entry = CacheEntry::new(etag.clone(), raw.clone());
        let ttl = self.inner.config.durable_ttl;

        match self.inner.store.put(&entry, ttl).await {
            Ok(()) => debug!(etag = %etag, ?ttl, "Durable cache updated"),
            Err(err) => warn!(error = %err, etag = %etag, "Failed to write durable cache"),
        }

        self.install(raw, etag, parsed)
    }

    async fn store_dataset(&self, dataset: Dataset, etag: String) -> Result<Arc<Snapshot>, SosError> {
        let raw = Bytes::from(serde_json::to_vec(&dataset).map_err(SosError::Encode)?);
        Ok(self.persist(raw, etag, Some(Arc::new(dataset))).await)
    }

    async fn load_durable(&self) -> Option<Arc<Snapshot>> {
        let entry = match self.inner.store.get().await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "Durable cache read failed, treating as miss");
                return None;
            }
        };

        let dataset: Dataset = match serde_json::from_slice(&entry.payload) {
            Ok(dataset) => dataset,
            Err(err) => {
                warn!(error = %err, etag = %entry.etag, "Durable cache payload undecodable, treating as miss");
                return None;
            }
        };

        debug!(etag = %entry.etag, "Durable cache hit");
        Some(self.install(entry.payload, entry.etag, Some(Arc::new(dataset))))
    }

    async fn load_cold(&self) -> Result<Arc<Snapshot>, SosError> {
        let err = match self.fetch_cold().await {
            Ok(snapshot) => return Ok(snapshot),
            Err(err) => err,
        };

        match self.inner.snapshot.load_full() {
            Some(stale) => {
                warn!(error = %err, etag = %stale.etag, "Upstream unavailable, serving stale snapshot");
                Ok(stale)
            }
            None => Err(err),
        }
    }

    async fn fetch_cold(&self) -> Result<Arc<Snapshot>, SosError> {
        match self.inner.fetcher.fetch("").await? {
            FetchOutcome::Modified { dataset, etag } => {
                info!(etag = %etag, records = dataset.records().len(), "Cache filled from upstream");
                self.store_dataset(dataset, etag).await
            }
            FetchOutcome::NotModified { .. } => Err(SosError::Empty),
        }
    }

    async fn revalidate(&self, etag: &str) {
        match self.inner.fetcher.fetch(etag).await {
            Ok(FetchOutcome::NotModified { etag }) => self.touch(&etag).await,
            Ok(FetchOutcome::Modified { dataset, etag }) => {
                info!(etag = %etag, records = dataset.records().len(), "Cache refreshed from upstream");
                if let Err(err) = self.store_dataset(dataset, etag).await {
                    warn!(error = %err, "Failed to store refreshed dataset");
                }
            }
            Err(err) => {
                warn!(error = %err, transient = err.is_transient(), "Cache refresh failed");
            }
        }
    }

    /// Restarts both TTL clocks for the bytes already held
    async fn touch(&self, etag: &str) {
        let Some(current) = self.inner.snapshot.load_full() else {
            return;
        };
        if current.raw.is_empty() {
            return;
        }

        debug!(etag, "Upstream unchanged, extending cache TTL");
        self.persist(current.raw.clone(), etag.to_string(), current.parsed.clone())
            .await;
    }
}
