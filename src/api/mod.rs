//! HTTP surface served by `coinpulse serve`.
//!
//! - [`indicators`] - batched RSI through the cache
//! - [`quotes`] - ticker pass-through, cached candles and market list

pub mod indicators;
pub mod quotes;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::PulseError;
use crate::cache::MarketCache;
use crate::indicator::IndicatorBatchService;
use crate::models::ErrorResponse;
use crate::rest::RestClient;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub rest: RestClient,
    pub cache: MarketCache,
    pub indicators: Arc<IndicatorBatchService<RestClient>>,
}

/// Builds the full router with request tracing.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .merge(indicators::routes())
        .merge(quotes::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A [`PulseError`] rendered as `{"error": "..."}`.
///
/// Validation errors become 400, upstream errors keep the upstream status,
/// everything else is 500.
#[derive(Debug)]
pub struct ApiError(pub PulseError);

impl From<PulseError> for ApiError {
    fn from(err: PulseError) -> Self {
        Self(err)
    }
}

/// A fetch error shared by every request that joined the same fetch.
impl From<Arc<PulseError>> for ApiError {
    fn from(err: Arc<PulseError>) -> Self {
        Self(Arc::try_unwrap(err).unwrap_or_else(|shared| match &*shared {
            PulseError::Upstream { status, body } => PulseError::Upstream {
                status: *status,
                body: body.clone(),
            },
            PulseError::Validation(reason) => PulseError::Validation(reason.clone()),
            other => PulseError::Io(other.to_string()),
        }))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            PulseError::Validation(_) => StatusCode::BAD_REQUEST,
            PulseError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.0, "Request rejected");
        }

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
