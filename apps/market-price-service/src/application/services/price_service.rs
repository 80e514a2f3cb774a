//! Cached price access.
//!
//! Composes the batch use case with three cache namespaces:
//!
//! - `direct`: single-ticker records, served stale when a refresh fails
//! - `history`: close series, served stale when a refresh fails
//! - `batch`: whole batch responses keyed by the sorted ticker list, strict

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::ports::{
    MarketDataError, MarketDataPort, PriceSourceError, PriceSourceKind, PriceSourcePort,
};
use crate::application::use_cases::{
    BatchPrices, ResolveBatchError, ResolveBatchUseCase, TickerResolutionError, validate_batch,
};
use crate::domain::market_data::{PriceSeries, PriceSnapshot, ResolvedPrice, TickerSymbol};
use crate::infrastructure::cache::{CacheTtlConfig, Cached, CoalescingCache};

/// Canonical cache key for a set of tickers.
///
/// Tickers are sorted and each is written as `<byte length>:<ticker>`, so
/// no ticker content can make two different sets share a key.
#[must_use]
pub fn batch_cache_key(tickers: &[TickerSymbol]) -> String {
    let mut sorted: Vec<&str> = tickers.iter().map(TickerSymbol::as_str).collect();
    sorted.sort_unstable();
    sorted.iter().fold(String::new(), |mut key, ticker| {
        key.push_str(&ticker.len().to_string());
        key.push(':');
        key.push_str(ticker);
        key
    })
}

/// The three cache namespaces.
pub struct PriceCache {
    direct: CoalescingCache<ResolvedPrice, TickerResolutionError>,
    history: CoalescingCache<PriceSeries, MarketDataError>,
    batch: CoalescingCache<BatchPrices, ResolveBatchError>,
}

impl PriceCache {
    /// Create empty namespaces with the given TTLs.
    #[must_use]
    pub fn new(ttl: CacheTtlConfig) -> Self {
        Self {
            direct: CoalescingCache::new("direct", ttl.direct),
            history: CoalescingCache::new("history", ttl.history),
            batch: CoalescingCache::new("batch", ttl.batch),
        }
    }

    /// Empty every namespace.
    pub fn reset(&self) {
        self.direct.clear();
        self.history.clear();
        self.batch.clear();
    }

    /// Direct-quote namespace.
    pub const fn direct(&self) -> &CoalescingCache<ResolvedPrice, TickerResolutionError> {
        &self.direct
    }

    /// History namespace.
    pub const fn history(&self) -> &CoalescingCache<PriceSeries, MarketDataError> {
        &self.history
    }

    /// Batch namespace.
    pub const fn batch(&self) -> &CoalescingCache<BatchPrices, ResolveBatchError> {
        &self.batch
    }
}

/// Cached front door to price resolution.
pub struct PriceService<M: MarketDataPort> {
    use_case: Arc<ResolveBatchUseCase<M>>,
    cache: PriceCache,
}

impl<M: MarketDataPort + 'static> PriceService<M> {
    /// Create a new PriceService.
    pub fn new(use_case: ResolveBatchUseCase<M>, ttl: CacheTtlConfig) -> Self {
        Self {
            use_case: Arc::new(use_case),
            cache: PriceCache::new(ttl),
        }
    }

    /// Cache namespaces.
    pub const fn cache(&self) -> &PriceCache {
        &self.cache
    }

    /// Validate and resolve a batch, sharing identical in-flight batches.
    pub async fn batch(&self, tickers: &[String]) -> Result<BatchPrices, ResolveBatchError> {
        let symbols = validate_batch(tickers)?;
        let key = batch_cache_key(&symbols);
        let use_case = Arc::clone(&self.use_case);

        self.cache
            .batch
            .get_or_fetch(&key, move || async move { use_case.resolve_symbols(symbols).await })
            .await
    }

    /// Single-ticker record, stale-tolerant.
    ///
    /// The fetch runs on its own task so a panicking port surfaces as
    /// [`TickerResolutionError::TaskAborted`] instead of poisoning the
    /// shared in-flight future.
    pub async fn direct_price(
        &self,
        ticker: &TickerSymbol,
    ) -> Result<Cached<ResolvedPrice>, TickerResolutionError> {
        let use_case = Arc::clone(&self.use_case);
        let owned = ticker.clone();

        self.cache
            .direct
            .get_or_fetch_stale_ok(ticker.as_str(), move || async move {
                tokio::spawn(async move { use_case.resolve_ticker(&owned).await })
                    .await
                    .unwrap_or_else(|e| {
                        tracing::error!(error = %e, "Direct price task aborted");
                        Err(TickerResolutionError::TaskAborted {
                            message: e.to_string(),
                        })
                    })
            })
            .await
    }

    /// Close series for `ticker`, oldest first, stale-tolerant.
    ///
    /// Sentinel tickers get an empty series without an upstream call.
    pub async fn history(
        &self,
        ticker: &TickerSymbol,
    ) -> Result<Cached<PriceSeries>, MarketDataError> {
        if self.use_case.is_sentinel(ticker) {
            return Ok(Cached {
                value: PriceSeries::empty(ticker.clone()),
                stale: false,
            });
        }

        let market_data = self.use_case.market_data();
        let config = *self.use_case.config();
        let owned = ticker.clone();

        self.cache
            .history
            .get_or_fetch_stale_ok(ticker.as_str(), move || async move {
                let fetch = tokio::spawn(async move {
                    let bars = market_data
                        .recent_bars(&owned, config.bars_limit, config.bars_timeout)
                        .await?;
                    Ok::<_, MarketDataError>(PriceSeries::from_bars(owned, &bars))
                });
                fetch.await.unwrap_or_else(|e| {
                    tracing::error!(error = %e, "History task aborted");
                    Err(MarketDataError::TaskAborted {
                        message: e.to_string(),
                    })
                })
            })
            .await
    }

    /// Drop every cached value.
    pub fn reset_caches(&self) {
        self.cache.reset();
        tracing::info!("Price caches reset");
    }
}

/// Feeds a [`PricePoller`](super::PricePoller) from an in-process [`PriceService`].
///
/// History comes from the history namespace, the direct source from the
/// direct namespace, and the fallback from a single-ticker batch.
pub struct ServicePriceSource<M: MarketDataPort> {
    service: Arc<PriceService<M>>,
}

impl<M: MarketDataPort> ServicePriceSource<M> {
    /// Create a new ServicePriceSource.
    pub const fn new(service: Arc<PriceService<M>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<M: MarketDataPort + 'static> PriceSourcePort for ServicePriceSource<M> {
    async fn historical_series(
        &self,
        ticker: &TickerSymbol,
    ) -> Result<PriceSeries, PriceSourceError> {
        self.service
            .history(ticker)
            .await
            .map(|cached| cached.value)
            .map_err(|e| PriceSourceError::new(PriceSourceKind::History, e.to_string()))
    }

    async fn direct_price(&self, ticker: &TickerSymbol) -> Result<PriceSnapshot, PriceSourceError> {
        self.service
            .direct_price(ticker)
            .await
            .map(|cached| PriceSnapshot::from(&cached.value))
            .map_err(|e| PriceSourceError::new(PriceSourceKind::Direct, e.to_string()))
    }

    async fn fallback_price(
        &self,
        ticker: &TickerSymbol,
    ) -> Result<PriceSnapshot, PriceSourceError> {
        let prices = self
            .service
            .batch(&[ticker.as_str().to_string()])
            .await
            .map_err(|e| PriceSourceError::new(PriceSourceKind::Fallback, e.to_string()))?;

        match prices.get(ticker) {
            Some(record) if record.is_error() => Err(PriceSourceError::new(
                PriceSourceKind::Fallback,
                record.error.clone().unwrap_or_default(),
            )),
            Some(record) => Ok(PriceSnapshot::from(record)),
            None => Err(PriceSourceError::new(
                PriceSourceKind::Fallback,
                "ticker missing from batch response",
            )),
        }
    }
}
