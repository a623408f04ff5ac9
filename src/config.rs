//! Application configuration loaded from environment variables.
//!
//! Every value has a default, so an empty environment yields a working
//! configuration against the public Upbit endpoints:
//! - `UPBIT_WEBSOCKET_URL` - streaming endpoint
//! - `UPBIT_REST_URL` - quotation REST base URL
//! - `COINPULSE_BIND_ADDR` - listen address for `serve`
//! - `COINPULSE_BATCH_SIZE` / `COINPULSE_BATCH_DELAY_MS` - indicator batching
//! - `COINPULSE_CACHE_POLICY` - optional JSON file overriding cache policy
//! - `COINPULSE_LOG_FILE` - log destination for `watch`

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::PulseError;
use crate::cache::CachePolicy;
use crate::indicator::BatchConfig;

/// Default public WebSocket endpoint.
const DEFAULT_WEBSOCKET_URL: &str = "wss://api.upbit.com/websocket/v1";

/// Default quotation REST endpoint.
const DEFAULT_REST_URL: &str = "https://api.upbit.com";

/// Default listen address for the HTTP API.
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Default log file for the watch view, which owns the terminal.
const DEFAULT_LOG_FILE: &str = "coinpulse.log";

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub upbit: UpbitConfig,
    pub server: ServerConfig,
    pub batch: BatchConfig,
    pub cache: CachePolicy,
    pub log_file: PathBuf,
}

/// Exchange endpoint configuration.
#[derive(Debug, Clone)]
pub struct UpbitConfig {
    pub websocket_url: String,
    pub rest_url: String,
}

/// HTTP API configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`PulseError::Config`] if a numeric or address variable does
/// not parse, if the batch size is zero, or if the cache policy file
/// cannot be read.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let websocket_url =
        non_empty_var("UPBIT_WEBSOCKET_URL").unwrap_or_else(|| DEFAULT_WEBSOCKET_URL.to_string());
    let rest_url = non_empty_var("UPBIT_REST_URL")
        .unwrap_or_else(|| DEFAULT_REST_URL.to_string())
        .trim_end_matches('/')
        .to_string();

    let bind_addr = non_empty_var("COINPULSE_BIND_ADDR")
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let bind_addr: SocketAddr = bind_addr.parse().map_err(|e| {
        PulseError::Config(format!("COINPULSE_BIND_ADDR {bind_addr:?} is invalid: {e}"))
    })?;

    let mut batch = BatchConfig::default();
    if let Some(size) = parse_var::<usize>("COINPULSE_BATCH_SIZE")? {
        if size == 0 {
            return Err(PulseError::Config(
                "COINPULSE_BATCH_SIZE must be at least 1".to_string(),
            ));
        }
        batch.group_size = size;
    }
    if let Some(delay_ms) = parse_var::<u64>("COINPULSE_BATCH_DELAY_MS")? {
        batch.group_delay = Duration::from_millis(delay_ms);
    }

    let cache = match non_empty_var("COINPULSE_CACHE_POLICY") {
        Some(path) => CachePolicy::load(Path::new(&path))?,
        None => CachePolicy::default(),
    };

    let log_file = PathBuf::from(
        non_empty_var("COINPULSE_LOG_FILE").unwrap_or_else(|| DEFAULT_LOG_FILE.to_string()),
    );

    Ok(AppConfig {
        upbit: UpbitConfig {
            websocket_url,
            rest_url,
        },
        server: ServerConfig { bind_addr },
        batch,
        cache,
        log_file,
    })
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Parses a non-empty environment variable, reporting the variable name on failure.
fn parse_var<T>(name: &str) -> crate::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| PulseError::Config(format!("{name} {raw:?} is invalid: {e}"))),
        None => Ok(None),
    }
}
