//! Daily OHLC bar.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One trading day's bar. Only the close is used for pricing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    /// Closing price.
    pub close: f64,
    /// Bar timestamp (start of the trading day upstream).
    pub observed_at: DateTime<Utc>,
}

impl Bar {
    /// Create a new bar.
    #[must_use]
    pub const fn new(close: f64, observed_at: DateTime<Utc>) -> Self {
        Self { close, observed_at }
    }
}
