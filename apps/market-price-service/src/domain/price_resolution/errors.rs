//! Resolution errors.

use thiserror::Error;

use crate::domain::market_data::TickerSymbol;

/// Errors raised while resolving a price record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// No candidate yielded a usable current price.
    #[error("no price data available for {ticker}")]
    NoPriceData {
        /// Ticker that could not be priced.
        ticker: TickerSymbol,
    },
}
