//! Alpaca Market Data Adapter
//!
//! REST client for Alpaca's Market Data v2 stock endpoints, implementing
//! [`MarketDataPort`](crate::application::ports::MarketDataPort).

mod adapter;
mod api_types;

pub use adapter::AlpacaMarketDataAdapter;
