//! Ordered closing-price history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Bar, TickerSymbol, is_valid_price};

/// A single close in a price series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    /// Closing price.
    pub close: f64,
    /// Bar timestamp.
    pub observed_at: DateTime<Utc>,
}

/// Closing prices for a ticker, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSeries {
    /// Ticker the series belongs to.
    pub ticker: TickerSymbol,
    /// Points ordered oldest to newest.
    pub points: Vec<SeriesPoint>,
}

impl PriceSeries {
    /// Build a series from bars in any order, dropping unusable closes.
    #[must_use]
    pub fn from_bars(ticker: TickerSymbol, bars: &[Bar]) -> Self {
        let mut points: Vec<SeriesPoint> = bars
            .iter()
            .filter(|bar| is_valid_price(bar.close))
            .map(|bar| SeriesPoint {
                close: bar.close,
                observed_at: bar.observed_at,
            })
            .collect();
        points.sort_by_key(|point| point.observed_at);
        Self { ticker, points }
    }

    /// An empty series.
    #[must_use]
    pub const fn empty(ticker: TickerSymbol) -> Self {
        Self {
            ticker,
            points: Vec::new(),
        }
    }

    /// Most recent close.
    #[must_use]
    pub fn last_close(&self) -> Option<f64> {
        self.points.last().map(|p| p.close)
    }

    /// Close immediately before the most recent one.
    #[must_use]
    pub fn second_to_last_close(&self) -> Option<f64> {
        self.points
            .len()
            .checked_sub(2)
            .and_then(|idx| self.points.get(idx))
            .map(|p| p.close)
    }

    /// True when the series has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 5, 0, 0).unwrap()
    }

    #[test]
    fn from_bars_orders_oldest_first_and_drops_invalid() {
        let bars = [
            Bar::new(103.0, day(4)),
            Bar::new(f64::NAN, day(5)),
            Bar::new(101.0, day(1)),
            Bar::new(0.0, day(2)),
        ];
        let series = PriceSeries::from_bars(TickerSymbol::new("AAPL"), &bars);

        let closes: Vec<f64> = series.points.iter().map(|p| p.close).collect();
        assert_eq!(closes, vec![101.0, 103.0]);
        assert_eq!(series.last_close(), Some(103.0));
        assert_eq!(series.second_to_last_close(), Some(101.0));
    }

    #[test]
    fn single_point_has_no_second_to_last() {
        let series = PriceSeries::from_bars(TickerSymbol::new("AAPL"), &[Bar::new(5.0, day(1))]);
        assert_eq!(series.last_close(), Some(5.0));
        assert_eq!(series.second_to_last_close(), None);
    }
}
