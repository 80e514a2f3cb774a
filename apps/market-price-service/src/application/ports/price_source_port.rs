//! Price Source Port (Driven Port)
//!
//! The three independent sources a [`PricePoller`](crate::application::services::PricePoller)
//! merges into one view.

use async_trait::async_trait;

use crate::domain::market_data::{PriceSeries, PriceSnapshot, TickerSymbol};

/// Which poller source a value or failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceSourceKind {
    /// Historical close series.
    History,
    /// Direct single-ticker quote.
    Direct,
    /// Batch quote used as a fallback.
    Fallback,
}

impl PriceSourceKind {
    /// Returns the label string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::History => "history",
            Self::Direct => "direct",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for PriceSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a price source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{source_kind} price source failed: {message}")]
pub struct PriceSourceError {
    /// Source that failed.
    pub source_kind: PriceSourceKind,
    /// Error details.
    pub message: String,
}

impl PriceSourceError {
    /// Create a new source error.
    #[must_use]
    pub fn new(source_kind: PriceSourceKind, message: impl Into<String>) -> Self {
        Self {
            source_kind,
            message: message.into(),
        }
    }
}

/// Port supplying the poller's price sources for a single ticker.
#[async_trait]
pub trait PriceSourcePort: Send + Sync {
    /// Historical closes, oldest first.
    async fn historical_series(&self, ticker: &TickerSymbol)
    -> Result<PriceSeries, PriceSourceError>;

    /// Direct price lookup.
    async fn direct_price(&self, ticker: &TickerSymbol) -> Result<PriceSnapshot, PriceSourceError>;

    /// Batch-backed fallback price lookup.
    async fn fallback_price(&self, ticker: &TickerSymbol)
    -> Result<PriceSnapshot, PriceSourceError>;
}
