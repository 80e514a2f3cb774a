//! HTTP Controller (Driver Adapter)
//!
//! Axum-based REST API that delegates to the price service.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::application::ports::MarketDataPort;
use crate::application::services::PriceService;
use crate::application::use_cases::BatchPrices;
use crate::domain::market_data::{ResolvedPrice, TickerSymbol};
use crate::infrastructure::metrics::get_metrics_handle;

use super::request::BatchPricesRequest;
use super::response::{ApiError, HealthResponse};

/// Header set to `true` when a response was served from an expired cache entry.
pub const STALE_HEADER: &str = "x-price-stale";

/// Application state shared across handlers.
pub struct AppState<M: MarketDataPort> {
    /// Cached price service.
    pub prices: Arc<PriceService<M>>,
    /// Application version.
    pub version: String,
}

impl<M: MarketDataPort> Clone for AppState<M> {
    fn clone(&self) -> Self {
        Self {
            prices: Arc::clone(&self.prices),
            version: self.version.clone(),
        }
    }
}

/// Create the HTTP router with all endpoints.
pub fn create_router<M: MarketDataPort + 'static>(state: AppState<M>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/prices/batch", post(batch_prices))
        .route("/api/v1/prices/{ticker}", get(direct_price))
        .route("/api/v1/prices/{ticker}/history", get(price_history))
        .route("/api/v1/cache/reset", post(reset_cache))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check<M: MarketDataPort>(State(state): State<AppState<M>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
    })
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

/// Batch price resolution endpoint.
async fn batch_prices<M: MarketDataPort + 'static>(
    State(state): State<AppState<M>>,
    payload: Result<Json<BatchPricesRequest>, JsonRejection>,
) -> Result<Json<BatchPrices>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    tracing::info!(count = request.tickers.len(), "Resolving price batch");
    let prices = state.prices.batch(&request.tickers).await?;

    Ok(Json(prices))
}

/// Single-ticker price endpoint. Per-ticker failures are reported in the body.
async fn direct_price<M: MarketDataPort + 'static>(
    State(state): State<AppState<M>>,
    Path(ticker): Path<String>,
) -> Response {
    let ticker = TickerSymbol::new(ticker);

    match state.prices.direct_price(&ticker).await {
        Ok(cached) => {
            let mut response = Json(cached.value).into_response();
            if cached.stale {
                response
                    .headers_mut()
                    .insert(STALE_HEADER, HeaderValue::from_static("true"));
            }
            response
        }
        Err(e) => {
            tracing::warn!(ticker = %ticker, error = %e, "Direct price unavailable");
            Json(ResolvedPrice::error(ticker, e.to_string())).into_response()
        }
    }
}

/// Recent close history endpoint.
async fn price_history<M: MarketDataPort + 'static>(
    State(state): State<AppState<M>>,
    Path(ticker): Path<String>,
) -> Result<Response, ApiError> {
    let ticker = TickerSymbol::new(ticker);

    let cached = state.prices.history(&ticker).await.map_err(|e| {
        tracing::warn!(ticker = %ticker, error = %e, "Price history unavailable");
        ApiError::bad_gateway(e.to_string())
    })?;

    let mut response = Json(cached.value).into_response();
    if cached.stale {
        response
            .headers_mut()
            .insert(STALE_HEADER, HeaderValue::from_static("true"));
    }
    Ok(response)
}

/// Forced refresh: drop every cached value.
async fn reset_cache<M: MarketDataPort + 'static>(State(state): State<AppState<M>>) -> StatusCode {
    state.prices.reset_caches();
    StatusCode::NO_CONTENT
}
