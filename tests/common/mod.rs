//! Shared test utilities: a fake quotation REST upstream and a fake
//! WebSocket feed, both bound to ephemeral local ports.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tungstenite::Message;

/// Upbit public WebSocket endpoint.
pub const UPBIT_WS_URL: &str = "wss://api.upbit.com/websocket/v1";

/// Upbit quotation REST endpoint.
pub const UPBIT_REST_URL: &str = "https://api.upbit.com";

/// Markets the fake upstream knows about.
pub const KNOWN_MARKETS: [&str; 4] = ["KRW-BTC", "KRW-ETH", "KRW-XRP", "KRW-EMPTY"];

/// Builds a rustls TLS config for use in tests.
pub fn test_tls_config() -> Arc<rustls::ClientConfig> {
    coinpulse::tls::shared_tls_config().expect("failed to build TLS config")
}

/// Ticker JSON in REST shape.
pub fn ticker_json(market: &str, price: f64) -> Value {
    json!({
        "market": market,
        "trade_price": price,
        "signed_change_price": 1000.0,
        "signed_change_rate": 0.01,
        "acc_trade_price_24h": 1.0e10,
        "acc_trade_volume_24h": 120.5,
        "high_price": price + 5000.0,
        "low_price": price - 5000.0,
        "opening_price": price - 1000.0,
        "prev_closing_price": price - 1000.0,
        "change": "RISE",
        "timestamp": 1_700_000_000_000i64
    })
}

/// Ticker JSON in streaming shape.
pub fn stream_ticker_json(market: &str, price: f64) -> Value {
    json!({
        "type": "ticker",
        "code": market,
        "trade_price": price,
        "signed_change_price": -500.0,
        "signed_change_rate": -0.005,
        "acc_trade_price_24h": 1.1e10,
        "acc_trade_volume_24h": 130.0,
        "high_price": price + 5000.0,
        "low_price": price - 5000.0,
        "opening_price": price + 500.0,
        "change": "FALL",
        "timestamp": 1_700_000_001_000i64,
        "stream_type": "REALTIME"
    })
}

/// Request counters shared with the fake upstream's handlers.
#[derive(Clone, Default)]
pub struct Counters {
    pub tickers: Arc<AtomicUsize>,
    pub candles: Arc<AtomicUsize>,
    pub markets: Arc<AtomicUsize>,
}

/// A local stand-in for the quotation REST API.
///
/// - `KRW-BTC` candles rise every bar, `KRW-ETH` candles fall every bar
/// - `KRW-XRP` alternates, `KRW-EMPTY` has no history
/// - unknown markets answer 404 with an upstream-style error body
pub struct FakeUpstream {
    pub base_url: String,
    pub counters: Counters,
}

impl FakeUpstream {
    pub async fn start() -> Self {
        let counters = Counters::default();
        let router = Router::new()
            .route("/v1/ticker", get(fake_tickers))
            .route("/v1/candles/minutes/{unit}", get(fake_candles))
            .route("/v1/market/all", get(fake_markets))
            .with_state(counters.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            counters,
        }
    }

    pub fn ticker_requests(&self) -> usize {
        self.counters.tickers.load(Ordering::SeqCst)
    }

    pub fn candle_requests(&self) -> usize {
        self.counters.candles.load(Ordering::SeqCst)
    }

    pub fn market_requests(&self) -> usize {
        self.counters.markets.load(Ordering::SeqCst)
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": {"name": "404", "message": "Code not found"}})),
    )
        .into_response()
}

async fn fake_tickers(
    State(counters): State<Counters>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    counters.tickers.fetch_add(1, Ordering::SeqCst);
    let markets = params.get("markets").cloned().unwrap_or_default();
    let mut tickers = Vec::new();
    for market in markets.split(',') {
        if !KNOWN_MARKETS.contains(&market) {
            return not_found();
        }
        tickers.push(ticker_json(market, 50_000_000.0));
    }
    Json(tickers).into_response()
}

async fn fake_candles(
    State(counters): State<Counters>,
    Path(unit): Path<u32>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    counters.candles.fetch_add(1, Ordering::SeqCst);
    let market = params.get("market").cloned().unwrap_or_default();
    let count: usize = params
        .get("count")
        .and_then(|c| c.parse().ok())
        .unwrap_or(1);

    // Newest first, like the real endpoint.
    let close = |age: usize| -> Option<f64> {
        let step = age as f64;
        match market.as_str() {
            "KRW-BTC" => Some(1_000.0 - step),
            "KRW-ETH" => Some(1_000.0 + step),
            "KRW-XRP" => Some(if age % 2 == 0 { 510.0 } else { 500.0 }),
            _ => None,
        }
    };

    match market.as_str() {
        "KRW-EMPTY" => Json(Vec::<Value>::new()).into_response(),
        m if !KNOWN_MARKETS.contains(&m) => not_found(),
        _ => {
            let candles: Vec<Value> = (0..count)
                .filter_map(|age| close(age).map(|price| (age, price)))
                .map(|(age, price)| {
                    json!({
                        "market": market,
                        "candle_date_time_utc": bar_time(age, 0),
                        "candle_date_time_kst": bar_time(age, 9),
                        "opening_price": price,
                        "high_price": price,
                        "low_price": price,
                        "trade_price": price,
                        "candle_acc_trade_volume": 1.0,
                        "candle_acc_trade_price": price,
                        "timestamp": 1_700_000_000_000i64 - (age as i64) * 60_000,
                        "unit": unit
                    })
                })
                .collect();
            Json(candles).into_response()
        }
    }
}

/// Bar-open time `age` minutes before 12:00, shifted by `offset_hours`.
fn bar_time(age: usize, offset_hours: usize) -> String {
    let minute_of_day = 12 * 60 - age;
    format!(
        "2024-01-01T{:02}:{:02}:00",
        (minute_of_day / 60 + offset_hours) % 24,
        minute_of_day % 60
    )
}

async fn fake_markets(State(counters): State<Counters>) -> Json<Value> {
    counters.markets.fetch_add(1, Ordering::SeqCst);
    Json(json!([
        {"market": "KRW-BTC", "korean_name": "비트코인", "english_name": "Bitcoin"},
        {"market": "BTC-ETH", "korean_name": "이더리움", "english_name": "Ethereum"},
        {"market": "KRW-ETH", "korean_name": "이더리움", "english_name": "Ethereum"}
    ]))
}

/// A local WebSocket feed. Every accepted connection is handed to the test.
pub struct FakeFeed {
    pub url: String,
    connections: mpsc::UnboundedReceiver<WebSocketStream<TcpStream>>,
}

impl FakeFeed {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, connections) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                if tx.send(ws).is_err() {
                    break;
                }
            }
        });

        Self {
            url: format!("ws://{addr}"),
            connections,
        }
    }

    /// Waits for the next client connection.
    pub async fn accept(&mut self) -> WebSocketStream<TcpStream> {
        tokio::time::timeout(Duration::from_secs(10), self.connections.recv())
            .await
            .expect("timed out waiting for a client connection")
            .expect("feed listener stopped")
    }

    /// Asserts that no client connects within `wait`.
    pub async fn expect_no_connection(&mut self, wait: Duration) {
        let result = tokio::time::timeout(wait, self.connections.recv()).await;
        assert!(result.is_err(), "client connected unexpectedly");
    }
}

/// Reads the next text frame from a client and parses it as JSON.
pub async fn next_json(ws: &mut WebSocketStream<TcpStream>) -> Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = ws.next().await {
            if let Ok(Message::Text(text)) = msg {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
        panic!("client closed before sending a text frame");
    })
    .await
    .expect("timed out waiting for a text frame")
}

/// Sends a JSON value as a binary frame, the way the exchange does.
pub async fn send_binary(ws: &mut WebSocketStream<TcpStream>, value: &Value) {
    ws.send(Message::Binary(serde_json::to_vec(value).unwrap().into()))
        .await
        .unwrap();
}

/// Waits until the client side closes the connection.
pub async fn wait_for_close(ws: &mut WebSocketStream<TcpStream>) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = ws.next().await {
            if matches!(msg, Ok(Message::Close(_)) | Err(_)) {
                return;
            }
        }
    })
    .await
    .expect("timed out waiting for the client to close");
}

/// Polls `check` every 20ms until it holds or five seconds pass.
pub async fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
