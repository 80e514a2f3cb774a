//! Application Services
//!
//! Application services coordinate domain logic and infrastructure adapters.
//! [`PriceService`] fronts the batch use case with namespaced caches;
//! [`PricePoller`] runs as a set of background tasks merging three price
//! sources for one ticker.

mod price_poller;
mod price_service;

pub use price_poller::{
    LATEST_PRICE_PRIORITY, MergeCandidate, PREVIOUS_PRICE_PRIORITY, PricePoller,
    PricePollerConfig, PriceView, SourceReadings, merge_readings,
};
pub use price_service::{PriceCache, PriceService, ServicePriceSource, batch_cache_key};
