//! Background refresh primitives
//!
//! `SingleFlight` keeps at most one upstream revalidation running per cache
//! instance. `spawn_watch` drives periodic reads through the cache so a
//! long-running consumer keeps both tiers warm, reporting over a tokio
//! channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::cache::SosCache;

/// Non-blocking exclusive flag guarding one in-flight refresh
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    busy: Arc<AtomicBool>,
}

/// Proof that the caller owns the flight; releases it when dropped
///
/// Dropping runs on every exit path of the owning task, unwinding included.
#[derive(Debug)]
pub struct FlightGuard {
    busy: Arc<AtomicBool>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the flight if nobody holds it
    ///
    /// # Returns
    /// * `Some(FlightGuard)` if this caller now owns the flight
    /// * `None` if a refresh is already running
    pub fn try_acquire(&self) -> Option<FlightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    /// Whether a refresh currently holds the flight
    pub fn in_flight(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

// ============================================================================
// Periodic watch
// ============================================================================

/// Messages sent from the watch loop to its consumer
#[derive(Debug, Clone)]
pub enum WatchMessage {
    /// A read through the cache succeeded
    Served {
        etag: String,
        records: usize,
    },
    /// A read through the cache failed
    Failed(String),
}

/// Configuration for the watch loop
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Interval between reads
    pub interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

/// Handle for controlling the watch loop
pub struct WatchHandle {
    /// Channel for receiving watch messages
    pub receiver: mpsc::Receiver<WatchMessage>,
    shutdown_tx: mpsc::Sender<()>,
}

impl WatchHandle {
    /// Stops the watch loop
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Spawns a task reading the dataset through `cache` every `config.interval`
///
/// The first read happens immediately, which also warms both tiers.
pub fn spawn_watch(cache: SosCache, config: WatchConfig) -> WatchHandle {
    let (msg_tx, msg_rx) = mpsc::channel(32);
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let message = match cache.get_dataset().await {
                        Ok(dataset) => WatchMessage::Served {
                            etag: cache.current_etag().unwrap_or_default(),
                            records: dataset.records().len(),
                        },
                        Err(err) => WatchMessage::Failed(err.to_string()),
                    };
                    if msg_tx.send(message).await.is_err() {
                        debug!("Watch receiver dropped, stopping");
                        break;
                    }
                }
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }
    });

    WatchHandle {
        receiver: msg_rx,
        shutdown_tx,
    }
}
