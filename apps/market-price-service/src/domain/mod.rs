//! Domain Layer
//!
//! Pure market data types and price resolution rules with zero
//! infrastructure dependencies.
//!
//! # Bounded Contexts
//!
//! - [`market_data`]: Ticker symbols, quote snapshots, daily bars and resolved prices
//! - [`price_resolution`]: Ordered fallback rules that turn raw market data into a price record

pub mod market_data;
pub mod price_resolution;
