//! Resolved price record returned to callers.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::TickerSymbol;

/// Provenance of a resolved price record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Resolved from upstream market data.
    Real,
    /// Synthetic placeholder for a sentinel ticker such as CASH.
    Mock,
    /// Resolution failed for this ticker.
    Error,
}

impl DataSource {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Real => "real",
            Self::Mock => "mock",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current price, previous close and daily change for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPrice {
    /// Ticker this record describes.
    pub ticker: TickerSymbol,
    /// Best available current price.
    pub current_price: Option<f64>,
    /// Best available previous close.
    pub previous_close: Option<f64>,
    /// `current_price - previous_close`.
    pub price_change: Option<f64>,
    /// Change as a percentage of the previous close.
    pub price_change_percent: Option<f64>,
    /// Where the record came from.
    pub data_source: DataSource,
    /// Failure description, present only for error records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResolvedPrice {
    /// A record resolved from real market data.
    #[must_use]
    pub const fn real(
        ticker: TickerSymbol,
        current_price: f64,
        previous_close: Option<f64>,
        price_change: Option<f64>,
        price_change_percent: Option<f64>,
    ) -> Self {
        Self {
            ticker,
            current_price: Some(current_price),
            previous_close,
            price_change,
            price_change_percent,
            data_source: DataSource::Real,
            error: None,
        }
    }

    /// Placeholder for a sentinel ticker: every numeric field null.
    #[must_use]
    pub const fn mock(ticker: TickerSymbol) -> Self {
        Self {
            ticker,
            current_price: None,
            previous_close: None,
            price_change: None,
            price_change_percent: None,
            data_source: DataSource::Mock,
            error: None,
        }
    }

    /// Failure record carrying a description of what went wrong.
    #[must_use]
    pub fn error(ticker: TickerSymbol, message: impl Into<String>) -> Self {
        Self {
            ticker,
            current_price: None,
            previous_close: None,
            price_change: None,
            price_change_percent: None,
            data_source: DataSource::Error,
            error: Some(message.into()),
        }
    }

    /// True for error records.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.data_source == DataSource::Error
    }
}

/// Point-in-time price pair consumed by the client poller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSnapshot {
    /// Latest price.
    pub price: Option<f64>,
    /// Previous close, if known.
    pub previous_close: Option<f64>,
}

impl From<&ResolvedPrice> for PriceSnapshot {
    fn from(value: &ResolvedPrice) -> Self {
        Self {
            price: value.current_price,
            previous_close: value.previous_close,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_record_serializes_nulls() {
        let record = ResolvedPrice::mock(TickerSymbol::new("CASH"));
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["ticker"], "CASH");
        assert!(json["currentPrice"].is_null());
        assert!(json["previousClose"].is_null());
        assert!(json["priceChange"].is_null());
        assert!(json["priceChangePercent"].is_null());
        assert_eq!(json["dataSource"], "mock");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn error_record_carries_message() {
        let record = ResolvedPrice::error(TickerSymbol::new("ZZZZ"), "no price data");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["dataSource"], "error");
        assert_eq!(json["error"], "no price data");
        assert!(record.is_error());
    }
}
