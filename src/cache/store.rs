//! Durable cache tier
//!
//! A shared, TTL-bounded store holding the last known payload under a single
//! fixed key. Production uses Redis so the copy survives restarts and is
//! shared between instances; `MemoryStore` stands in for local-only runs and
//! tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Pool, PoolConfig, Runtime};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::entry::CacheEntry;

/// Key under which the dataset envelope is stored
pub const CACHE_KEY: &str = "request:data:raw";

/// Errors raised by the durable tier
///
/// None of these are surfaced to callers; the cache service logs them and
/// degrades to a miss.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create Redis pool: {0}")]
    CreatePool(#[from] deadpool_redis::CreatePoolError),

    #[error("Failed to get Redis connection: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("Redis command failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Store {op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("Failed to encode cache entry: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode cache entry: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Capability to read and write the durable cache entry
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Reads the current entry, `Ok(None)` on a miss
    async fn get(&self) -> Result<Option<CacheEntry>, StoreError>;

    /// Overwrites the entry, applying `ttl` in the same operation
    async fn put(&self, entry: &CacheEntry, ttl: Duration) -> Result<(), StoreError>;

    /// Liveness check
    async fn ping(&self) -> Result<(), StoreError>;
}

// ============================================================================
// Redis
// ============================================================================

/// Redis-backed durable store
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    key: String,
    /// Bound applied to every store operation
    timeout: Duration,
}

impl RedisStore {
    /// Builds a connection pool for `url`
    ///
    /// No connection is made here; the first operation (or `ping`) dials.
    pub fn connect(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let mut config = deadpool_redis::Config::from_url(url);
        let mut pool_config = PoolConfig::new(4);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        config.pool = Some(pool_config);

        let pool = config.create_pool(Some(Runtime::Tokio1))?;

        Ok(Self {
            pool,
            key: CACHE_KEY.to_string(),
            timeout,
        })
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: std::future::Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout {
                op,
                after: self.timeout,
            })?
    }
}

#[async_trait]
impl DurableStore for RedisStore {
    async fn get(&self) -> Result<Option<CacheEntry>, StoreError> {
        let value = self
            .bounded("get", async {
                let mut conn = self.pool.get().await?;
                let value: Option<Vec<u8>> = conn.get(&self.key).await?;
                Ok(value)
            })
            .await?;

        match value {
            Some(bytes) => CacheEntry::decode(&bytes)
                .map(Some)
                .map_err(StoreError::Decode),
            None => {
                debug!(key = %self.key, "Redis cache miss");
                Ok(None)
            }
        }
    }

    async fn put(&self, entry: &CacheEntry, ttl: Duration) -> Result<(), StoreError> {
        let bytes = entry.encode().map_err(StoreError::Encode)?;
        let ttl_secs = ttl.as_secs().max(1);

        self.bounded("put", async {
            let mut conn = self.pool.get().await?;
            conn.set_ex::<_, _, ()>(&self.key, bytes, ttl_secs).await?;
            Ok(())
        })
        .await?;

        debug!(key = %self.key, etag = %entry.etag, ttl_secs, "Redis cache updated");
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded("ping", async {
            let mut conn = self.pool.get().await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local stand-in for the shared store
///
/// Keeps the encoded envelope exactly as Redis would, including expiry, so
/// the same decode path is exercised.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<(Vec<u8>, Instant)>>,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<(Vec<u8>, Instant)>> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Recovered from poisoned memory store lock");
                poisoned.into_inner()
            }
        }
    }

    /// Stores raw envelope bytes without validation
    pub fn insert_raw(&self, bytes: Vec<u8>, ttl: Duration) {
        *self.lock() = Some((bytes, Instant::now() + ttl));
    }

    /// Number of `get` calls served so far
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of successful `put` calls so far
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self) -> Result<Option<CacheEntry>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);

        let mut slot = self.lock();
        if matches!(slot.as_ref(), Some((_, expires_at)) if Instant::now() >= *expires_at) {
            *slot = None;
        }
        let bytes = match slot.as_ref() {
            Some((bytes, _)) => bytes.clone(),
            None => return Ok(None),
        };
        drop(slot);

        CacheEntry::decode(&bytes)
            .map(Some)
            .map_err(StoreError::Decode)
    }

    async fn put(&self, entry: &CacheEntry, ttl: Duration) -> Result<(), StoreError> {
        let bytes = entry.encode().map_err(StoreError::Encode)?;
        self.insert_raw(bytes, ttl);
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
