#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Market Price Service - Batch Quote Resolution
//!
//! Resolves the current price, previous close and daily change for batches
//! of tickers from Alpaca market data. Results are cached per namespace with
//! a TTL, and concurrent identical requests share one upstream fetch.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure price resolution
//!   - `market_data`: Tickers, quotes, bars and resolved price records
//!   - `price_resolution`: Candidate ordering and daily change math
//!
//! - **Application**: Use cases, ports and services
//!   - `ports`: Upstream market data and poller source interfaces
//!   - `use_cases`: Batch validation and per-ticker fan-out
//!   - `services`: Cached price access and the client-side poller
//!
//! - **Infrastructure**: Adapters and runtime plumbing
//!   - `alpaca`: REST adapter for latest quotes and daily bars
//!   - `cache`: TTL cache with single-flight coalescing
//!   - `config`: Environment configuration
//!   - `http`: REST API
//!   - `metrics`, `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//! POST /api/v1/prices/batch
//!         │
//!         ▼
//!   PriceService ──(batch cache)──► ResolveBatchUseCase
//!                                         │ one task per ticker
//!                                         ▼
//!                        latest quote + daily bars (Alpaca)
//!                                         │
//!                                         ▼
//!                                  price_resolution::resolve
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Price resolution with no external dependencies.
pub mod domain;

/// Application layer - Use cases, ports and services.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::market_data::{
    Bar, DataSource, PriceSeries, PriceSnapshot, QuoteSnapshot, ResolvedPrice, TickerSymbol,
};
pub use domain::price_resolution::{ResolutionError, daily_change, resolve};

// Application
pub use application::services::{PricePoller, PricePollerConfig, PriceService, PriceView};
pub use application::use_cases::{
    BatchFetchConfig, MAX_BATCH_SIZE, ResolveBatchError, ResolveBatchUseCase,
};

// Infrastructure
pub use infrastructure::alpaca::AlpacaMarketDataAdapter;
pub use infrastructure::cache::{CacheTtlConfig, CoalescingCache};
pub use infrastructure::config::{ConfigError, ServiceConfig};
pub use infrastructure::metrics::init_metrics;
