//! Market Data Bounded Context
//!
//! Value objects describing what the upstream provider returns and what the
//! service hands back to callers.

pub mod value_objects;

pub use value_objects::{
    Bar, DataSource, PriceSeries, PriceSnapshot, QuoteSnapshot, ResolvedPrice, SeriesPoint,
    TickerSymbol,
};
