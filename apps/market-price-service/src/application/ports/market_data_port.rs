//! Market Data Port (Driven Port)
//!
//! Interface for fetching quotes and daily bars from an external provider.
//! This is a secondary/outbound port used by the batch use case.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::market_data::{Bar, QuoteSnapshot, TickerSymbol};

/// Upstream call kinds, used for error context and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamOperation {
    /// Latest quote lookup.
    LatestQuote,
    /// Recent daily bars lookup.
    RecentBars,
}

impl UpstreamOperation {
    /// Returns the label string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LatestQuote => "latest_quote",
            Self::RecentBars => "recent_bars",
        }
    }
}

impl std::fmt::Display for UpstreamOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market data error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketDataError {
    /// The call did not complete within its timeout.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// Call that timed out.
        operation: UpstreamOperation,
        /// Timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// Connection error.
    #[error("Market data connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Authentication failed.
    #[error("Market data authentication failed")]
    AuthenticationFailed,

    /// Rate limited.
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Upstream answered with a non-success status.
    #[error("Market data API error ({status}): {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Error details.
        message: String,
    },

    /// Upstream payload could not be decoded.
    #[error("Malformed market data payload: {message}")]
    MalformedPayload {
        /// Error details.
        message: String,
    },

    /// The task running the call panicked or was cancelled.
    #[error("Market data task aborted: {message}")]
    TaskAborted {
        /// Join error details.
        message: String,
    },
}

impl MarketDataError {
    /// Short label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::ConnectionError { .. } => "connection",
            Self::AuthenticationFailed => "auth",
            Self::RateLimited { .. } => "rate_limited",
            Self::ApiError { .. } => "api",
            Self::MalformedPayload { .. } => "malformed",
            Self::TaskAborted { .. } => "aborted",
        }
    }
}

/// Port for fetching market data from external providers.
///
/// Implementations must enforce the supplied timeout and report it as
/// [`MarketDataError::Timeout`].
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Latest quote for `ticker`.
    ///
    /// `Ok(None)` when the provider has no quote for the ticker.
    async fn latest_quote(
        &self,
        ticker: &TickerSymbol,
        timeout: Duration,
    ) -> Result<Option<QuoteSnapshot>, MarketDataError>;

    /// Up to `limit` most recent daily bars, in any order.
    async fn recent_bars(
        &self,
        ticker: &TickerSymbol,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<Bar>, MarketDataError>;
}
