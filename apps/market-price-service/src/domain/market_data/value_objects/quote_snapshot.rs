//! Latest quote snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Most recent best ask and best bid for a ticker.
///
/// Either side may be missing. Values are stored as received; validity is
/// decided by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSnapshot {
    /// Best ask price.
    pub ask: Option<f64>,
    /// Best bid price.
    pub bid: Option<f64>,
    /// When the quote was observed upstream.
    pub observed_at: DateTime<Utc>,
}

impl QuoteSnapshot {
    /// Create a new quote snapshot.
    #[must_use]
    pub const fn new(ask: Option<f64>, bid: Option<f64>, observed_at: DateTime<Utc>) -> Self {
        Self {
            ask,
            bid,
            observed_at,
        }
    }
}
