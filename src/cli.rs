//! Command-line interface parsing for sosfeed
//!
//! This module handles parsing of CLI arguments using clap, with environment
//! fallbacks for the upstream and Redis URLs, and turns them into validated
//! runtime settings.

use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::cache::{CacheConfig, DURABLE_TTL, SAFETY_MARGIN, STORE_TIMEOUT};
use crate::data::{DEFAULT_FEED_URL, FETCH_TIMEOUT};
use crate::severity::{Level, ParseLevelError};
use crate::views::{Area, PriorityQuery};

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// A duration option was set to zero
    #[error("Invalid value for --{0}: must be greater than zero")]
    ZeroDuration(&'static str),

    #[error(transparent)]
    InvalidLevel(#[from] ParseLevelError),

    #[error("Feed URL must not be empty")]
    EmptyFeedUrl,
}

/// sosfeed - cached view of the SOS emergency feed
#[derive(Parser, Debug)]
#[command(name = "sosfeed")]
#[command(about = "Cached, triaged view of the SOS emergency request feed")]
#[command(version)]
pub struct Cli {
    /// Upstream feed URL
    #[arg(long, env = "SOSFEED_URL", default_value = DEFAULT_FEED_URL)]
    pub feed_url: String,

    /// Redis URL for the shared durable cache; in-memory only when unset
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Lifetime of the durable cache entry, in seconds
    #[arg(long, default_value_t = DURABLE_TTL.as_secs())]
    pub durable_ttl_secs: u64,

    /// How much sooner the in-process copy expires, in seconds
    #[arg(long, default_value_t = SAFETY_MARGIN.as_secs())]
    pub safety_margin_secs: u64,

    /// Upstream request timeout, in seconds
    #[arg(long, default_value_t = FETCH_TIMEOUT.as_secs())]
    pub fetch_timeout_secs: u64,

    /// Timeout for each Redis operation, in seconds
    #[arg(long, default_value_t = STORE_TIMEOUT.as_secs())]
    pub store_timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the cached payload as served
    Raw,

    /// Reports filed under a province
    Province { name: String },

    /// Reports filed under a district
    District { name: String },

    /// Reports filed under a subdistrict
    Subdistrict { name: String },

    /// Reports located in southern Thailand
    South,

    /// Distinct area names with report counts
    Summary {
        /// Only count reports from southern provinces
        #[arg(long)]
        south: bool,
    },

    /// Southern reports ordered by severity
    ///
    /// Examples:
    ///   sosfeed priority                       # Everything, most urgent first
    ///   sosfeed priority --level critical      # Critical reports only
    ///   sosfeed priority --limit 20            # Top 20
    Priority {
        /// low, medium, high, critical, or all
        #[arg(long, value_name = "LEVEL")]
        level: Option<String>,

        /// Maximum number of reports to print
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Check the durable store
    Health,

    /// Keep reading through the cache and log each refresh
    Watch {
        /// Seconds between reads
        #[arg(long, default_value_t = 30)]
        interval_secs: u64,
    },
}

/// What a subcommand asks for once its arguments are validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Raw,
    Area { area: Area, name: String },
    South,
    Summary { south: bool },
    Priority(PriorityQuery),
    Health,
    Watch { interval: Duration },
}

/// Validated runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub feed_url: String,
    pub redis_url: Option<String>,
    pub cache: CacheConfig,
    pub fetch_timeout: Duration,
    pub store_timeout: Duration,
    pub action: Action,
}

/// Parses a `--level` argument
///
/// # Returns
/// * `Ok(None)` for an empty value or `all`
/// * `Ok(Some(Level))` for a known level name
/// * `Err(CliError::InvalidLevel)` otherwise
pub fn parse_level_arg(s: &str) -> Result<Option<Level>, CliError> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    Ok(Some(trimmed.parse()?))
}

fn non_zero_secs(secs: u64, option: &'static str) -> Result<Duration, CliError> {
    if secs == 0 {
        return Err(CliError::ZeroDuration(option));
    }
    Ok(Duration::from_secs(secs))
}

impl Settings {
    /// Creates Settings from parsed CLI arguments.
    ///
    /// # Arguments
    /// * `cli` - The parsed CLI struct
    ///
    /// # Returns
    /// * `Ok(Settings)` with durations and the requested action resolved
    /// * `Err(CliError)` for a zero duration, blank URL or unknown level
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let feed_url = cli.feed_url.trim();
        if feed_url.is_empty() {
            return Err(CliError::EmptyFeedUrl);
        }

        let cache = CacheConfig {
            durable_ttl: non_zero_secs(cli.durable_ttl_secs, "durable-ttl-secs")?,
            safety_margin: Duration::from_secs(cli.safety_margin_secs),
            ..CacheConfig::default()
        };

        let action = match &cli.command {
            Command::Raw => Action::Raw,
            Command::Province { name } => Action::Area {
                area: Area::Province,
                name: name.clone(),
            },
            Command::District { name } => Action::Area {
                area: Area::District,
                name: name.clone(),
            },
            Command::Subdistrict { name } => Action::Area {
                area: Area::Subdistrict,
                name: name.clone(),
            },
            Command::South => Action::South,
            Command::Summary { south } => Action::Summary { south: *south },
            Command::Priority { level, limit } => Action::Priority(PriorityQuery {
                level: match level {
                    Some(level) => parse_level_arg(level)?,
                    None => None,
                },
                limit: *limit,
            }),
            Command::Health => Action::Health,
            Command::Watch { interval_secs } => Action::Watch {
                interval: non_zero_secs(*interval_secs, "interval-secs")?,
            },
        };

        Ok(Settings {
            feed_url: feed_url.to_string(),
            redis_url: cli
                .redis_url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string),
            cache,
            fetch_timeout: non_zero_secs(cli.fetch_timeout_secs, "fetch-timeout-secs")?,
            store_timeout: non_zero_secs(cli.store_timeout_secs, "store-timeout-secs")?,
            action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(args: &[&str]) -> Result<Settings, CliError> {
        let mut argv = vec!["sosfeed"];
        argv.extend_from_slice(args);
        Settings::from_cli(&Cli::parse_from(argv))
    }

    #[test]
    fn test_parse_level_arg_known_levels() {
        assert_eq!(parse_level_arg("critical").unwrap(), Some(Level::Critical));
        assert_eq!(parse_level_arg("HIGH").unwrap(), Some(Level::High));
    }

    #[test]
    fn test_parse_level_arg_all_means_no_filter() {
        assert_eq!(parse_level_arg("all").unwrap(), None);
        assert_eq!(parse_level_arg("  ").unwrap(), None);
    }

    #[test]
    fn test_parse_level_arg_invalid() {
        let err = parse_level_arg("urgent").unwrap_err();
        assert!(err.to_string().contains("urgent"));
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&["raw"]).unwrap();

        assert_eq!(settings.feed_url, DEFAULT_FEED_URL);
        assert_eq!(settings.cache, CacheConfig::default());
        assert_eq!(settings.fetch_timeout, FETCH_TIMEOUT);
        assert_eq!(settings.store_timeout, STORE_TIMEOUT);
        assert_eq!(settings.action, Action::Raw);
    }

    #[test]
    fn test_cli_parse_area_commands() {
        let settings = settings(&["district", "Hat Yai"]).unwrap();
        assert_eq!(
            settings.action,
            Action::Area {
                area: Area::District,
                name: "Hat Yai".to_string()
            }
        );
    }

    #[test]
    fn test_cli_parse_priority_options() {
        let settings = settings(&["priority", "--level", "high", "--limit", "5"]).unwrap();
        assert_eq!(
            settings.action,
            Action::Priority(PriorityQuery {
                level: Some(Level::High),
                limit: Some(5)
            })
        );
    }

    #[test]
    fn test_cli_parse_summary_south_flag() {
        let settings = settings(&["summary", "--south"]).unwrap();
        assert_eq!(settings.action, Action::Summary { south: true });
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let err = settings(&["--durable-ttl-secs", "0", "raw"]).unwrap_err();
        assert!(matches!(err, CliError::ZeroDuration("durable-ttl-secs")));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(settings(&["--fetch-timeout-secs", "0", "raw"]).is_err());
        assert!(settings(&["--store-timeout-secs", "0", "raw"]).is_err());
        assert!(settings(&["watch", "--interval-secs", "0"]).is_err());
    }

    #[test]
    fn test_margin_may_exceed_ttl() {
        let settings = settings(&["--durable-ttl-secs", "3", "--safety-margin-secs", "10", "raw"]).unwrap();
        assert_eq!(settings.cache.process_ttl(), Duration::from_secs(3));
    }

    #[test]
    fn test_blank_redis_url_means_local_only() {
        let settings = settings(&["--redis-url", " ", "health"]).unwrap();
        assert!(settings.redis_url.is_none());
    }

    #[test]
    fn test_invalid_priority_level_is_error() {
        let err = settings(&["priority", "--level", "severe"]).unwrap_err();
        assert!(matches!(err, CliError::InvalidLevel(_)));
    }
}
