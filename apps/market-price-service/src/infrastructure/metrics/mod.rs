//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Batches**: Per-batch record outcomes (real, mock, error)
//! - **Upstream**: Market data calls by operation and result, with latency
//! - **Cache**: Hits, misses, coalesced waits and stale fallbacks per namespace
//! - **Poller**: Source refreshes by source and result
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP server port. Recording
//! functions are no-ops until [`init_metrics`] installs the recorder.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::application::ports::{PriceSourceKind, UpstreamOperation};
use crate::application::use_cases::BatchOutcome;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle installed by the first one.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "market_price_batch_outcomes_total",
        "Resolved batch records by data source"
    );
    describe_counter!(
        "market_price_upstream_requests_total",
        "Market data calls by operation and result"
    );
    describe_histogram!(
        "market_price_upstream_request_seconds",
        "Market data call latency"
    );
    describe_counter!(
        "market_price_cache_events_total",
        "Cache lookups by namespace and event"
    );
    describe_counter!(
        "market_price_poller_refreshes_total",
        "Client poller source refreshes by source and result"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for cache lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    /// Fresh value served.
    Hit,
    /// New fetch started.
    Miss,
    /// Joined a fetch already in flight.
    Coalesced,
    /// Expired value served after a failed refresh.
    StaleServed,
}

impl CacheEvent {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Coalesced => "coalesced",
            Self::StaleServed => "stale_served",
        }
    }
}

/// Record the outcome counts of one batch.
pub fn record_batch_outcome(outcome: &BatchOutcome) {
    for (label, count) in [
        ("real", outcome.real),
        ("mock", outcome.mock),
        ("error", outcome.error),
    ] {
        if count > 0 {
            counter!("market_price_batch_outcomes_total", "outcome" => label).increment(count as u64);
        }
    }
}

/// Record one upstream call. `result` is "ok" or an error kind.
pub fn record_upstream_request(operation: UpstreamOperation, result: &'static str, elapsed: Duration) {
    counter!(
        "market_price_upstream_requests_total",
        "operation" => operation.as_str(),
        "result" => result
    )
    .increment(1);
    histogram!(
        "market_price_upstream_request_seconds",
        "operation" => operation.as_str()
    )
    .record(elapsed.as_secs_f64());
}

/// Record a cache lookup event.
pub fn record_cache_event(namespace: &'static str, event: CacheEvent) {
    counter!(
        "market_price_cache_events_total",
        "namespace" => namespace,
        "event" => event.as_str()
    )
    .increment(1);
}

/// Record a poller source refresh.
pub fn record_poller_refresh(source: PriceSourceKind, ok: bool) {
    counter!(
        "market_price_poller_refreshes_total",
        "source" => source.as_str(),
        "result" => if ok { "ok" } else { "error" }
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_event_as_str() {
        assert_eq!(CacheEvent::Hit.as_str(), "hit");
        assert_eq!(CacheEvent::Miss.as_str(), "miss");
        assert_eq!(CacheEvent::Coalesced.as_str(), "coalesced");
        assert_eq!(CacheEvent::StaleServed.as_str(), "stale_served");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_cache_event("direct", CacheEvent::Hit);
        record_batch_outcome(&BatchOutcome {
            real: 1,
            mock: 0,
            error: 2,
        });
        record_upstream_request(UpstreamOperation::LatestQuote, "ok", Duration::from_millis(5));
    }
}
