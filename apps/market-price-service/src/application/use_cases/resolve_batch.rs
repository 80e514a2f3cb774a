//! Resolve Batch Use Case
//!
//! Validates a batch of tickers, resolves each one concurrently against the
//! market data port, and aggregates the per-ticker records. A failure for
//! one ticker never affects another.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::Instrument;

use crate::application::ports::{MarketDataError, MarketDataPort};
use crate::domain::market_data::{DataSource, ResolvedPrice, TickerSymbol};
use crate::domain::price_resolution::{ResolutionError, resolve};
use crate::infrastructure::metrics;

/// Maximum number of distinct tickers accepted in one batch.
pub const MAX_BATCH_SIZE: usize = 20;

/// Tickers answered with a mock record instead of an upstream lookup.
pub const SENTINEL_TICKERS: &[&str] = &["CASH", "USD", "USDC"];

/// Resolved records keyed by ticker.
pub type BatchPrices = BTreeMap<TickerSymbol, ResolvedPrice>;

/// Upstream fetch limits applied to every ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchFetchConfig {
    /// Timeout for the latest-quote call. A timeout here is not fatal.
    pub quote_timeout: Duration,
    /// Timeout for the recent-bars call.
    pub bars_timeout: Duration,
    /// Number of daily bars requested.
    pub bars_limit: usize,
}

impl Default for BatchFetchConfig {
    fn default() -> Self {
        Self {
            quote_timeout: Duration::from_secs(3),
            bars_timeout: Duration::from_secs(10),
            bars_limit: 10,
        }
    }
}

/// Request-shape violations. Nothing is fetched when one of these occurs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchValidationError {
    /// No tickers supplied.
    #[error("tickers must be a non-empty list")]
    Empty,

    /// Too many entries in the request.
    #[error("batch of {count} tickers exceeds the maximum of {max}")]
    TooMany {
        /// Entries requested, duplicates included.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// A ticker was empty or whitespace.
    #[error("ticker at index {index} is blank")]
    BlankTicker {
        /// Position in the request list.
        index: usize,
    },
}

/// Request-level batch failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveBatchError {
    /// The request was rejected before any fetch.
    #[error("invalid batch request: {0}")]
    InvalidBatchRequest(#[from] BatchValidationError),

    /// Something unexpected broke the aggregation itself.
    #[error("internal error: {message}")]
    Internal {
        /// Error details.
        message: String,
    },
}

/// Why a single ticker could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TickerResolutionError {
    /// The bars call failed.
    #[error("failed to fetch bars: {source}")]
    BarsUnavailable {
        /// Underlying upstream failure.
        source: MarketDataError,
    },

    /// Data arrived but nothing usable was in it.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The resolution task panicked or was cancelled.
    #[error("resolution task aborted: {message}")]
    TaskAborted {
        /// Join error details.
        message: String,
    },
}

/// Per-batch tally of record provenance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Records resolved from market data.
    pub real: usize,
    /// Sentinel records.
    pub mock: usize,
    /// Failed records.
    pub error: usize,
}

impl BatchOutcome {
    /// Count records by data source.
    pub fn tally<'a>(prices: impl IntoIterator<Item = &'a ResolvedPrice>) -> Self {
        prices
            .into_iter()
            .fold(Self::default(), |mut outcome, price| {
                match price.data_source {
                    DataSource::Real => outcome.real += 1,
                    DataSource::Mock => outcome.mock += 1,
                    DataSource::Error => outcome.error += 1,
                }
                outcome
            })
    }

    /// Total records counted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.real + self.mock + self.error
    }
}

/// Validate a raw ticker list and collapse duplicates, keeping first-seen order.
///
/// The size limit applies to the list as sent, before duplicates collapse.
///
/// # Errors
///
/// Returns [`BatchValidationError`] for an empty list, more than
/// [`MAX_BATCH_SIZE`] entries, or a blank entry.
pub fn validate_batch(tickers: &[String]) -> Result<Vec<TickerSymbol>, BatchValidationError> {
    if tickers.is_empty() {
        return Err(BatchValidationError::Empty);
    }
    if tickers.len() > MAX_BATCH_SIZE {
        return Err(BatchValidationError::TooMany {
            count: tickers.len(),
            max: MAX_BATCH_SIZE,
        });
    }

    let mut seen = HashSet::with_capacity(tickers.len());
    let mut symbols = Vec::with_capacity(tickers.len());
    for (index, raw) in tickers.iter().enumerate() {
        let symbol = TickerSymbol::new(raw.as_str());
        if symbol.is_blank() {
            return Err(BatchValidationError::BlankTicker { index });
        }
        if seen.insert(symbol.clone()) {
            symbols.push(symbol);
        }
    }

    Ok(symbols)
}

/// Resolves one ticker against the market data port.
struct TickerResolver<M: MarketDataPort> {
    market_data: Arc<M>,
    config: BatchFetchConfig,
}

impl<M: MarketDataPort> Clone for TickerResolver<M> {
    fn clone(&self) -> Self {
        Self {
            market_data: Arc::clone(&self.market_data),
            config: self.config,
        }
    }
}

impl<M: MarketDataPort> TickerResolver<M> {
    async fn resolve(&self, ticker: &TickerSymbol) -> Result<ResolvedPrice, TickerResolutionError> {
        let (quote, bars) = tokio::join!(
            self.market_data
                .latest_quote(ticker, self.config.quote_timeout),
            self.market_data
                .recent_bars(ticker, self.config.bars_limit, self.config.bars_timeout),
        );

        // A missing quote only narrows the candidate set.
        let quote = quote.unwrap_or_else(|e| {
            tracing::debug!(ticker = %ticker, error = %e, "Quote unavailable, continuing with bars");
            None
        });
        let bars = bars.map_err(|source| TickerResolutionError::BarsUnavailable { source })?;

        Ok(resolve(ticker, quote.as_ref(), &bars)?)
    }
}

/// Use case for resolving a batch of tickers.
pub struct ResolveBatchUseCase<M: MarketDataPort> {
    resolver: TickerResolver<M>,
    sentinels: HashSet<TickerSymbol>,
}

impl<M: MarketDataPort + 'static> ResolveBatchUseCase<M> {
    /// Create a new ResolveBatchUseCase with the default sentinel set.
    pub fn new(market_data: Arc<M>, config: BatchFetchConfig) -> Self {
        Self {
            resolver: TickerResolver {
                market_data,
                config,
            },
            sentinels: SENTINEL_TICKERS
                .iter()
                .map(|s| TickerSymbol::new(*s))
                .collect(),
        }
    }

    /// Replace the sentinel set.
    #[must_use]
    pub fn with_sentinels<I, S>(mut self, sentinels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sentinels = sentinels
            .into_iter()
            .map(|s| TickerSymbol::new(s))
            .collect();
        self
    }

    /// Fetch limits in effect.
    pub const fn config(&self) -> &BatchFetchConfig {
        &self.resolver.config
    }

    /// Underlying market data port.
    pub fn market_data(&self) -> Arc<M> {
        Arc::clone(&self.resolver.market_data)
    }

    /// True when `ticker` is answered with a mock record.
    pub fn is_sentinel(&self, ticker: &TickerSymbol) -> bool {
        self.sentinels.contains(ticker)
    }

    /// Validate and resolve a raw ticker list.
    pub async fn execute(&self, tickers: &[String]) -> Result<BatchPrices, ResolveBatchError> {
        let symbols = validate_batch(tickers)?;
        self.resolve_symbols(symbols).await
    }

    /// Resolve already-validated tickers concurrently.
    ///
    /// Returns only after every per-ticker task has settled.
    pub async fn resolve_symbols(
        &self,
        symbols: Vec<TickerSymbol>,
    ) -> Result<BatchPrices, ResolveBatchError> {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("resolve_batch", %request_id, size = symbols.len());

        async move {
            let mut prices = BatchPrices::new();
            let mut pending = Vec::with_capacity(symbols.len());

            for ticker in symbols {
                if self.is_sentinel(&ticker) {
                    prices.insert(ticker.clone(), ResolvedPrice::mock(ticker));
                    continue;
                }
                let resolver = self.resolver.clone();
                let handle = tokio::spawn(
                    async move {
                        let record = resolver.resolve(&ticker).await.unwrap_or_else(|e| {
                            tracing::warn!(ticker = %ticker, error = %e, "Ticker resolution failed");
                            ResolvedPrice::error(ticker.clone(), e.to_string())
                        });
                        (ticker, record)
                    }
                    .in_current_span(),
                );
                pending.push(handle);
            }

            let mut internal_failure = None;
            for joined in join_all(pending).await {
                match joined {
                    Ok((ticker, record)) => {
                        prices.insert(ticker, record);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Ticker task aborted");
                        internal_failure.get_or_insert_with(|| e.to_string());
                    }
                }
            }
            if let Some(message) = internal_failure {
                return Err(ResolveBatchError::Internal { message });
            }

            let outcome = BatchOutcome::tally(prices.values());
            tracing::info!(
                real = outcome.real,
                mock = outcome.mock,
                error = outcome.error,
                "Batch resolved"
            );
            metrics::record_batch_outcome(&outcome);

            Ok(prices)
        }
        .instrument(span)
        .await
    }

    /// Resolve a single ticker, sentinel-aware.
    pub async fn resolve_ticker(
        &self,
        ticker: &TickerSymbol,
    ) -> Result<ResolvedPrice, TickerResolutionError> {
        if self.is_sentinel(ticker) {
            return Ok(ResolvedPrice::mock(ticker.clone()));
        }
        self.resolver.resolve(ticker).await
    }
}
