//! In-process TTL cache with single-flight request coalescing.
//!
//! [`CoalescingCache`] is the building block; the price service composes one
//! instance per namespace (direct quotes, history, batches) with its own TTL.

mod coalescing;

use std::time::Duration;

pub use coalescing::{Cached, CoalescingCache};

/// Time-to-live per cache namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtlConfig {
    /// Direct single-ticker quotes.
    pub direct: Duration,
    /// Historical close series.
    pub history: Duration,
    /// Whole-batch responses keyed by the sorted ticker list.
    pub batch: Duration,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            direct: Duration::from_secs(300),
            history: Duration::from_secs(600),
            batch: Duration::from_secs(60),
        }
    }
}
