//! Application Ports (Driven)
//!
//! Ports define interfaces for interacting with external systems.
//! - [`MarketDataPort`]: how the service reads quotes and bars upstream
//! - [`PriceSourcePort`]: how the client poller reads its three price sources

mod market_data_port;
mod price_source_port;

pub use market_data_port::{MarketDataError, MarketDataPort, UpstreamOperation};
pub use price_source_port::{PriceSourceError, PriceSourceKind, PriceSourcePort};
