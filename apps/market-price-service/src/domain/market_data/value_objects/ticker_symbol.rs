//! Ticker symbol value object.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An instrument identifier as supplied by the caller.
///
/// Tickers are opaque and case-sensitive: "aapl" and "AAPL" are distinct
/// keys and are forwarded upstream exactly as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickerSymbol(String);

impl TickerSymbol {
    /// Create a new ticker symbol without normalization.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the ticker string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// True when the ticker is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for TickerSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TickerSymbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for TickerSymbol {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for TickerSymbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
