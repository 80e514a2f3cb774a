//! Alpaca wire types.
//!
//! Field names follow Alpaca's abbreviated JSON keys. Only the fields the
//! service reads are declared; unknown fields are ignored.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::market_data::{Bar, QuoteSnapshot};

/// `GET /v2/stocks/{symbol}/quotes/latest`
#[derive(Debug, Deserialize)]
pub(super) struct LatestQuoteResponse {
    #[serde(default)]
    pub quote: Option<AlpacaQuote>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AlpacaQuote {
    /// Ask price.
    #[serde(default)]
    pub ap: Option<f64>,
    /// Bid price.
    #[serde(default)]
    pub bp: Option<f64>,
    /// Timestamp.
    pub t: DateTime<Utc>,
}

impl From<AlpacaQuote> for QuoteSnapshot {
    fn from(raw: AlpacaQuote) -> Self {
        // Alpaca reports a missing side as 0.
        Self::new(
            raw.ap.filter(|v| *v != 0.0),
            raw.bp.filter(|v| *v != 0.0),
            raw.t,
        )
    }
}

/// `GET /v2/stocks/{symbol}/bars`
#[derive(Debug, Deserialize)]
pub(super) struct BarsResponse {
    #[serde(default)]
    pub bars: Option<Vec<AlpacaBar>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AlpacaBar {
    /// Close.
    pub c: f64,
    /// Timestamp.
    pub t: DateTime<Utc>,
}

impl From<AlpacaBar> for Bar {
    fn from(raw: AlpacaBar) -> Self {
        Self::new(raw.c, raw.t)
    }
}
