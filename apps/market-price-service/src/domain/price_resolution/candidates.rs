//! Candidate price extractors and their fallback orders.

use crate::domain::market_data::value_objects::is_valid_price;
use crate::domain::market_data::{Bar, QuoteSnapshot};

/// Raw inputs for one resolution, with bars already ranked newest first.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolutionInputs<'a> {
    /// Most recent bar.
    pub current_bar: Option<&'a Bar>,
    /// Bar before the most recent one.
    pub previous_bar: Option<&'a Bar>,
    /// Latest quote, if one was obtained.
    pub quote: Option<&'a QuoteSnapshot>,
}

impl<'a> ResolutionInputs<'a> {
    /// Rank `bars` by timestamp (newest first) and pick the top two.
    ///
    /// Ties keep their input order.
    #[must_use]
    pub fn new(quote: Option<&'a QuoteSnapshot>, bars: &'a [Bar]) -> Self {
        let mut ranked: Vec<&'a Bar> = bars.iter().collect();
        ranked.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        Self {
            current_bar: ranked.first().copied(),
            previous_bar: ranked.get(1).copied(),
            quote,
        }
    }
}

/// A single place a price can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceCandidate {
    /// Close of the most recent bar.
    CurrentBarClose,
    /// Best ask of the latest quote.
    QuoteAsk,
    /// Best bid of the latest quote.
    QuoteBid,
    /// Close of the bar before the most recent one.
    PreviousBarClose,
}

impl PriceCandidate {
    /// Read this candidate's raw value, if present.
    #[must_use]
    pub fn extract(self, inputs: &ResolutionInputs<'_>) -> Option<f64> {
        match self {
            Self::CurrentBarClose => inputs.current_bar.map(|bar| bar.close),
            Self::QuoteAsk => inputs.quote.and_then(|quote| quote.ask),
            Self::QuoteBid => inputs.quote.and_then(|quote| quote.bid),
            Self::PreviousBarClose => inputs.previous_bar.map(|bar| bar.close),
        }
    }

    /// Label used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CurrentBarClose => "current_bar_close",
            Self::QuoteAsk => "quote_ask",
            Self::QuoteBid => "quote_bid",
            Self::PreviousBarClose => "previous_bar_close",
        }
    }
}

/// Fallback order for the current price.
pub const CURRENT_PRICE_CANDIDATES: [PriceCandidate; 4] = [
    PriceCandidate::CurrentBarClose,
    PriceCandidate::QuoteAsk,
    PriceCandidate::QuoteBid,
    PriceCandidate::PreviousBarClose,
];

/// Fallback order for the previous close.
///
/// The quote sides are tried bid before ask here, the reverse of
/// [`CURRENT_PRICE_CANDIDATES`].
pub const PREVIOUS_CLOSE_CANDIDATES: [PriceCandidate; 4] = [
    PriceCandidate::PreviousBarClose,
    PriceCandidate::CurrentBarClose,
    PriceCandidate::QuoteBid,
    PriceCandidate::QuoteAsk,
];

/// First candidate in `order` whose value is finite and positive.
#[must_use]
pub fn first_valid(
    order: &[PriceCandidate],
    inputs: &ResolutionInputs<'_>,
) -> Option<(PriceCandidate, f64)> {
    order.iter().find_map(|candidate| {
        candidate
            .extract(inputs)
            .filter(|value| is_valid_price(*value))
            .map(|value| (*candidate, value))
    })
}
