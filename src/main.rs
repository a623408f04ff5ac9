use std::fs::File;
use std::sync::{Arc, Mutex};

use coinpulse::api::{self, AppState};
use coinpulse::cache::MarketCache;
use coinpulse::config::{AppConfig, fetch_config};
use coinpulse::indicator::{DEFAULT_PERIOD, IndicatorBatchService};
use coinpulse::models::Symbol;
use coinpulse::models::market::is_krw_market_code;
use coinpulse::pipeline::MarketPipeline;
use coinpulse::rest::RestClient;
use coinpulse::tls::shared_tls_config;
use coinpulse::{PulseError, Result, tui};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: coinpulse [serve | watch [MARKET...]]";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = fetch_config()?;

    match args.first().map(String::as_str) {
        None | Some("serve") => serve(config).await,
        Some("watch") => watch(config, &args[1..]).await,
        Some(other) => Err(PulseError::Config(format!(
            "unknown command '{other}'; {USAGE}"
        ))),
    }
}

/// Runs the HTTP API until Ctrl-C.
async fn serve(config: AppConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let tls_config = shared_tls_config()?;
    let rest = RestClient::new(&config.upbit.rest_url, tls_config)?;
    let state = AppState {
        cache: MarketCache::new(config.cache.clone()),
        indicators: Arc::new(IndicatorBatchService::new(rest.clone(), config.batch.clone())),
        rest,
    };

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr)
        .await
        .map_err(|e| PulseError::Io(format!("failed to bind {}: {e}", config.server.bind_addr)))?;
    info!(addr = %config.server.bind_addr, "Serving API");

    axum::serve(listener, api::routes(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .map_err(|e| PulseError::Io(e.to_string()))
}

/// Runs the terminal watch view. Logs go to a file since the view owns stdout.
async fn watch(config: AppConfig, markets: &[String]) -> Result<()> {
    let markets: Vec<Symbol> = if markets.is_empty() {
        vec!["KRW-BTC".to_string()]
    } else {
        markets.iter().map(|m| m.to_uppercase()).collect()
    };
    if let Some(bad) = markets.iter().find(|m| !is_krw_market_code(m)) {
        return Err(PulseError::Validation(format!(
            "'{bad}' is not a KRW market code"
        )));
    }

    let log_file = File::create(&config.log_file).map_err(|e| {
        PulseError::Io(format!("failed to open {}: {e}", config.log_file.display()))
    })?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();

    let pipeline = MarketPipeline::start(&config, markets)?;
    let result = tui::run(&pipeline, DEFAULT_PERIOD).await;
    pipeline.shutdown().await;
    result
}
