//! Market data value objects.

mod bar;
mod price_series;
mod quote_snapshot;
mod resolved_price;
mod ticker_symbol;

pub use bar::Bar;
pub use price_series::{PriceSeries, SeriesPoint};
pub use quote_snapshot::QuoteSnapshot;
pub use resolved_price::{DataSource, PriceSnapshot, ResolvedPrice};
pub use ticker_symbol::TickerSymbol;

/// Whether a raw price is usable: finite and strictly positive.
#[must_use]
pub fn is_valid_price(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
