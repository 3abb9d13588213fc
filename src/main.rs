//! sosfeed - cached view of the SOS emergency request feed
//!
//! Reads the feed through the two-tier cache and prints JSON on stdout.
//! Logs go to stderr, filtered by `RUST_LOG`.

use std::io::{self, Write};
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sosfeed::cache::{DurableStore, Health, MemoryStore, RedisStore, SosCache};
use sosfeed::cli::{Action, Cli, Settings};
use sosfeed::data::HttpFetcher;
use sosfeed::refresh::{spawn_watch, WatchConfig, WatchMessage};
use sosfeed::views;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "sosfeed=info".into()),
        )
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

/// Redis when configured and reachable at pool level, otherwise process-local
fn build_store(settings: &Settings) -> Arc<dyn DurableStore> {
    let Some(url) = &settings.redis_url else {
        info!("No Redis URL configured, using in-memory durable tier");
        return Arc::new(MemoryStore::new());
    };

    match RedisStore::connect(url, settings.store_timeout) {
        Ok(store) => {
            info!(timeout = ?settings.store_timeout, "Using Redis durable tier");
            Arc::new(store)
        }
        Err(err) => {
            warn!(error = %err, "Failed to set up Redis, falling back to in-memory durable tier");
            Arc::new(MemoryStore::new())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

async fn watch(cache: SosCache, config: WatchConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(interval = ?config.interval, "Watching feed, press Ctrl-C to stop");
    let mut handle = spawn_watch(cache, config);

    loop {
        tokio::select! {
            message = handle.receiver.recv() => match message {
                Some(WatchMessage::Served { etag, records }) => {
                    info!(%etag, records, "Feed served");
                }
                Some(WatchMessage::Failed(err)) => {
                    warn!(error = %err, "Feed read failed");
                }
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Stopping watch");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let fetcher = HttpFetcher::new(settings.feed_url.clone(), settings.fetch_timeout)?;
    let store = build_store(&settings);
    let cache = SosCache::new(Arc::new(fetcher), store, settings.cache.clone());

    match settings.action {
        Action::Raw => {
            let raw = cache.get_raw().await?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(&raw)?;
            writeln!(stdout)?;
        }
        Action::Area { area, name } => {
            let dataset = cache.get_dataset().await?;
            print_json(&views::filter_by_area(dataset.records(), area, &name))?;
        }
        Action::South => {
            let dataset = cache.get_dataset().await?;
            print_json(&views::southern(dataset.records()))?;
        }
        Action::Summary { south } => {
            let dataset = cache.get_dataset().await?;
            let summary = if south {
                views::southern_area_summary(dataset.records())
            } else {
                views::area_summary(dataset.records())
            };
            print_json(&summary)?;
        }
        Action::Priority(query) => {
            let dataset = cache.get_dataset().await?;
            print_json(&views::prioritize(dataset.records(), &query))?;
        }
        Action::Health => match cache.health().await {
            Health::Ok => print_json(&json!({ "status": "ok" }))?,
            Health::Down => {
                print_json(&json!({ "redis": "down" }))?;
                return Err("durable store is unreachable".into());
            }
        },
        Action::Watch { interval } => watch(cache, WatchConfig { interval }).await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::from_cli(&cli)?;

    run(settings).await
}
