//! Live market-data pipeline for an exchange trading dashboard.
//!
//! A WebSocket stream patches cached ticker lists in place, a REST poller
//! replaces them wholesale, and RSI values are computed in paced batches
//! so the upstream rate limit is respected.

pub mod account;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod indicator;
pub mod models;
pub mod pipeline;
pub mod rest;
pub mod shutdown;
pub mod tls;
pub mod tui;
pub mod websocket;

pub use error::{PulseError, Result};
