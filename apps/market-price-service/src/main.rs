//! Market Price Service Binary
//!
//! Starts the batch price HTTP API.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin market-price-service
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `ALPACA_KEY`: Alpaca API key
//! - `ALPACA_SECRET`: Alpaca API secret
//!
//! ## Optional
//! - `ALPACA_DATA_URL`: Market data base URL (default: <https://data.alpaca.markets>)
//! - `ALPACA_FEED`: "iex" | "sip" (default: iex)
//! - `PRICE_SERVICE_HTTP_PORT`: HTTP port (default: 8090)
//! - `PRICE_QUOTE_TIMEOUT_MS` / `PRICE_BARS_TIMEOUT_MS`: Upstream timeouts (default: 3000 / 10000)
//! - `PRICE_BARS_LIMIT`: Daily bars requested per ticker (default: 10)
//! - `PRICE_DIRECT_TTL_SECS` / `PRICE_HISTORY_TTL_SECS` / `PRICE_BATCH_TTL_SECS`: Cache TTLs
//! - `PRICE_WATCHLIST`: Comma-separated tickers kept warm by background pollers
//! - `PRICE_DIRECT_POLL_SECS` / `PRICE_FALLBACK_POLL_SECS`: Poller periods (default: 300 / 600)
//! - `OTEL_ENABLED`, `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_SERVICE_NAME`: Trace export
//! - `RUST_LOG`: Log level (default: info)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use market_price_service::application::services::ServicePriceSource;
use market_price_service::infrastructure::http::{AppState, create_router};
use market_price_service::infrastructure::telemetry;
use market_price_service::{
    AlpacaMarketDataAdapter, PricePoller, PriceService, ResolveBatchUseCase, ServiceConfig,
    TickerSymbol, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Market Price Service");

    if let Err(e) = init_metrics() {
        tracing::error!(error = %e, "Failed to install Prometheus recorder");
    }

    let config = ServiceConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let market_data = Arc::new(
        AlpacaMarketDataAdapter::new(&config.alpaca).context("failed to build Alpaca client")?,
    );
    let use_case = ResolveBatchUseCase::new(market_data, config.fetch);
    let prices = Arc::new(PriceService::new(use_case, config.cache));

    let shutdown_token = CancellationToken::new();
    let pollers = start_watchlist(&config, &prices, &shutdown_token);

    let state = AppState {
        prices,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.http_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "HTTP server listening");

    let server_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        await_shutdown(server_shutdown).await;
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_token.clone().cancelled_owned())
        .await
        .context("HTTP server error")?;

    for poller in pollers {
        poller.stop().await;
    }

    tracing::info!("Market Price Service stopped");
    Ok(())
}

/// Spawn one poller per watchlist ticker and log its merged view.
fn start_watchlist(
    config: &ServiceConfig,
    prices: &Arc<PriceService<AlpacaMarketDataAdapter>>,
    shutdown_token: &CancellationToken,
) -> Vec<PricePoller> {
    let source = Arc::new(ServicePriceSource::new(Arc::clone(prices)));

    config
        .watchlist
        .tickers
        .iter()
        .map(|ticker| {
            let poller = PricePoller::spawn(
                TickerSymbol::new(ticker.clone()),
                Arc::clone(&source),
                config.watchlist.poller,
                shutdown_token,
            );

            let mut views = poller.subscribe();
            let ticker = poller.ticker().clone();
            tokio::spawn(async move {
                while views.changed().await.is_ok() {
                    let view = *views.borrow_and_update();
                    tracing::info!(
                        ticker = %ticker,
                        latest = ?view.latest_price,
                        previous = ?view.previous_price,
                        change_percent = view.daily_change_percent,
                        "Watchlist price updated"
                    );
                }
            });

            poller
        })
        .collect()
}

/// Log the parsed configuration.
fn log_config(config: &ServiceConfig) {
    tracing::info!(
        feed = config.alpaca.feed.as_str(),
        http_port = config.server.http_port,
        bars_limit = config.fetch.bars_limit,
        watchlist = config.watchlist.tickers.len(),
        "Configuration loaded"
    );
    tracing::debug!(
        data_url = %config.alpaca.data_url,
        direct_ttl_secs = config.cache.direct.as_secs(),
        history_ttl_secs = config.cache.history.as_secs(),
        batch_ttl_secs = config.cache.batch.as_secs(),
        "Cache and upstream settings"
    );
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for SIGTERM or SIGINT, then cancel `shutdown_token`.
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
