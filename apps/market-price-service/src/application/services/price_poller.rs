//! Client Price Poller
//!
//! Runs three independent sources for one ticker and merges whatever each
//! has produced into a single [`PriceView`]:
//!
//! - history: fetched on start and on explicit [`PricePoller::refresh_history`]
//! - direct: fetched on start and every `direct_interval`
//! - fallback: fetched on start and every `fallback_interval`
//!
//! Sources never wait on each other. Each result, success or failure,
//! re-runs the merge and publishes the view on a watch channel.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{PriceSourceError, PriceSourceKind, PriceSourcePort};
use crate::domain::market_data::{PriceSeries, PriceSnapshot, TickerSymbol};
use crate::infrastructure::metrics;

/// Poll periods for the interval-driven sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricePollerConfig {
    /// Period of the direct source.
    pub direct_interval: Duration,
    /// Period of the fallback source.
    pub fallback_interval: Duration,
}

impl Default for PricePollerConfig {
    fn default() -> Self {
        Self {
            direct_interval: Duration::from_secs(300),
            fallback_interval: Duration::from_secs(600),
        }
    }
}

/// Merged price view for one ticker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceView {
    /// Latest price by source priority.
    pub latest_price: Option<f64>,
    /// Reference price for the daily change.
    pub previous_price: Option<f64>,
    /// Percent change from previous to latest, 0 when unknown.
    pub daily_change_percent: f64,
    /// True until every source has produced its first result.
    pub is_loading: bool,
}

impl Default for PriceView {
    fn default() -> Self {
        Self {
            latest_price: None,
            previous_price: None,
            daily_change_percent: 0.0,
            is_loading: true,
        }
    }
}

/// Last value seen from each source, plus whether each has reported yet.
///
/// A failed refresh keeps the source's previous value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceReadings {
    /// History series.
    pub history: Option<PriceSeries>,
    /// Direct snapshot.
    pub direct: Option<PriceSnapshot>,
    /// Fallback snapshot.
    pub fallback: Option<PriceSnapshot>,
    history_reported: bool,
    direct_reported: bool,
    fallback_reported: bool,
}

impl SourceReadings {
    /// Record a history result.
    pub fn record_history(&mut self, result: Result<PriceSeries, PriceSourceError>) {
        self.history_reported = true;
        if let Ok(series) = result {
            self.history = Some(series);
        }
    }

    /// Record a direct or fallback result.
    pub fn record_snapshot(
        &mut self,
        kind: PriceSourceKind,
        result: Result<PriceSnapshot, PriceSourceError>,
    ) {
        let (slot, reported) = match kind {
            PriceSourceKind::Direct => (&mut self.direct, &mut self.direct_reported),
            PriceSourceKind::Fallback => (&mut self.fallback, &mut self.fallback_reported),
            PriceSourceKind::History => return,
        };
        *reported = true;
        if let Ok(snapshot) = result {
            *slot = Some(snapshot);
        }
    }

    /// True once every source has reported, successfully or not.
    pub const fn all_reported(&self) -> bool {
        self.history_reported && self.direct_reported && self.fallback_reported
    }
}

/// Places the merge reads a price from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeCandidate {
    /// Last close of the history series.
    HistoryLast,
    /// Second-to-last close of the history series.
    HistorySecondToLast,
    /// Direct snapshot price.
    DirectPrice,
    /// Direct snapshot previous close, else its price.
    DirectPreviousClose,
    /// Fallback snapshot price.
    FallbackPrice,
    /// Fallback snapshot previous close, else its price.
    FallbackPreviousClose,
}

impl MergeCandidate {
    /// Read this candidate from `readings`.
    #[must_use]
    pub fn extract(self, readings: &SourceReadings) -> Option<f64> {
        let history = readings.history.as_ref();
        match self {
            Self::HistoryLast => history.and_then(PriceSeries::last_close),
            Self::HistorySecondToLast => history.and_then(PriceSeries::second_to_last_close),
            Self::DirectPrice => readings.direct.and_then(|s| s.price),
            Self::DirectPreviousClose => readings.direct.and_then(|s| s.previous_close.or(s.price)),
            Self::FallbackPrice => readings.fallback.and_then(|s| s.price),
            Self::FallbackPreviousClose => {
                readings.fallback.and_then(|s| s.previous_close.or(s.price))
            }
        }
    }
}

/// Priority order for the latest price.
pub const LATEST_PRICE_PRIORITY: [MergeCandidate; 3] = [
    MergeCandidate::HistoryLast,
    MergeCandidate::DirectPrice,
    MergeCandidate::FallbackPrice,
];

/// Priority order for the previous price. A single-point history yields
/// its only close here, which makes the change zero.
pub const PREVIOUS_PRICE_PRIORITY: [MergeCandidate; 4] = [
    MergeCandidate::HistorySecondToLast,
    MergeCandidate::HistoryLast,
    MergeCandidate::DirectPreviousClose,
    MergeCandidate::FallbackPreviousClose,
];

fn first_available(order: &[MergeCandidate], readings: &SourceReadings) -> Option<f64> {
    order.iter().find_map(|candidate| candidate.extract(readings))
}

/// Merge source readings into a view.
#[must_use]
pub fn merge_readings(readings: &SourceReadings) -> PriceView {
    let latest_price = first_available(&LATEST_PRICE_PRIORITY, readings);
    let previous_price = first_available(&PREVIOUS_PRICE_PRIORITY, readings);
    let daily_change_percent = match (latest_price, previous_price) {
        (Some(latest), Some(previous)) if previous > 0.0 => (latest - previous) / previous * 100.0,
        _ => 0.0,
    };

    PriceView {
        latest_price,
        previous_price,
        daily_change_percent,
        is_loading: !readings.all_reported(),
    }
}

struct PollerState {
    readings: SourceReadings,
    torn_down: bool,
}

struct PollerShared {
    ticker: TickerSymbol,
    state: Mutex<PollerState>,
    view_tx: watch::Sender<PriceView>,
    shutdown: CancellationToken,
}

impl PollerShared {
    /// Apply a source result and republish. Results arriving after
    /// teardown are dropped.
    fn apply(&self, kind: PriceSourceKind, update: impl FnOnce(&mut SourceReadings), ok: bool) {
        let mut state = self.state.lock();
        if state.torn_down || self.shutdown.is_cancelled() {
            tracing::debug!(ticker = %self.ticker, source = %kind, "Discarding result after shutdown");
            return;
        }
        metrics::record_poller_refresh(kind, ok);
        update(&mut state.readings);
        let view = merge_readings(&state.readings);
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }

    fn tear_down(&self) {
        let mut state = self.state.lock();
        state.torn_down = true;
        self.shutdown.cancel();
    }
}

#[derive(Debug, Clone, Copy)]
enum SnapshotSource {
    Direct,
    Fallback,
}

impl SnapshotSource {
    const fn kind(self) -> PriceSourceKind {
        match self {
            Self::Direct => PriceSourceKind::Direct,
            Self::Fallback => PriceSourceKind::Fallback,
        }
    }
}

/// Background poller for one ticker.
///
/// Dropping the poller stops every source.
pub struct PricePoller {
    shared: Arc<PollerShared>,
    view_rx: watch::Receiver<PriceView>,
    history_refresh: Arc<Notify>,
    tasks: Vec<JoinHandle<()>>,
}

impl PricePoller {
    /// Start polling `ticker`. Must be called inside a Tokio runtime.
    ///
    /// The poller stops when `parent` is cancelled or when it is shut down.
    pub fn spawn<S>(
        ticker: TickerSymbol,
        source: Arc<S>,
        config: PricePollerConfig,
        parent: &CancellationToken,
    ) -> Self
    where
        S: PriceSourcePort + 'static,
    {
        let (view_tx, view_rx) = watch::channel(PriceView::default());
        let shared = Arc::new(PollerShared {
            ticker,
            state: Mutex::new(PollerState {
                readings: SourceReadings::default(),
                torn_down: false,
            }),
            view_tx,
            shutdown: parent.child_token(),
        });
        let history_refresh = Arc::new(Notify::new());

        tracing::info!(
            ticker = %shared.ticker,
            direct_interval_secs = config.direct_interval.as_secs(),
            fallback_interval_secs = config.fallback_interval.as_secs(),
            "Starting price poller"
        );

        let tasks = vec![
            tokio::spawn(run_history(
                Arc::clone(&shared),
                Arc::clone(&source),
                Arc::clone(&history_refresh),
            )),
            tokio::spawn(run_snapshot(
                Arc::clone(&shared),
                Arc::clone(&source),
                SnapshotSource::Direct,
                config.direct_interval,
            )),
            tokio::spawn(run_snapshot(
                Arc::clone(&shared),
                source,
                SnapshotSource::Fallback,
                config.fallback_interval,
            )),
        ];

        Self {
            shared,
            view_rx,
            history_refresh,
            tasks,
        }
    }

    /// Ticker being polled.
    pub fn ticker(&self) -> &TickerSymbol {
        &self.shared.ticker
    }

    /// Receiver notified whenever the merged view changes.
    pub fn subscribe(&self) -> watch::Receiver<PriceView> {
        self.view_rx.clone()
    }

    /// Current merged view.
    pub fn current(&self) -> PriceView {
        *self.view_rx.borrow()
    }

    /// Ask the history source to fetch again.
    pub fn refresh_history(&self) {
        self.history_refresh.notify_one();
    }

    /// Stop every source. Results still in flight are discarded.
    pub fn shutdown(&self) {
        self.shared.tear_down();
    }

    /// True after shutdown or parent cancellation.
    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Shut down and wait for every source task to exit.
    pub async fn stop(mut self) {
        self.shutdown();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                tracing::warn!(ticker = %self.shared.ticker, error = %e, "Poller task ended abnormally");
            }
        }
    }
}

impl Drop for PricePoller {
    fn drop(&mut self) {
        self.shared.tear_down();
    }
}

async fn run_history<S: PriceSourcePort>(
    shared: Arc<PollerShared>,
    source: Arc<S>,
    refresh: Arc<Notify>,
) {
    let shutdown = shared.shutdown.clone();
    loop {
        let result = tokio::select! {
            result = source.historical_series(&shared.ticker) => result,
            () = shutdown.cancelled() => break,
        };
        if let Err(e) = &result {
            tracing::warn!(ticker = %shared.ticker, error = %e, "History refresh failed");
        }
        let ok = result.is_ok();
        shared.apply(PriceSourceKind::History, |r| r.record_history(result), ok);

        tokio::select! {
            () = refresh.notified() => {}
            () = shutdown.cancelled() => break,
        }
    }
    tracing::debug!(ticker = %shared.ticker, "History source stopped");
}

async fn run_snapshot<S: PriceSourcePort>(
    shared: Arc<PollerShared>,
    source: Arc<S>,
    which: SnapshotSource,
    period: Duration,
) {
    let shutdown = shared.shutdown.clone();
    let kind = which.kind();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let fetch = async {
                    match which {
                        SnapshotSource::Direct => source.direct_price(&shared.ticker).await,
                        SnapshotSource::Fallback => source.fallback_price(&shared.ticker).await,
                    }
                };
                let result = tokio::select! {
                    result = fetch => result,
                    () = shutdown.cancelled() => break,
                };
                if let Err(e) = &result {
                    tracing::warn!(ticker = %shared.ticker, source = %kind, error = %e, "Price refresh failed");
                }
                let ok = result.is_ok();
                shared.apply(kind, |r| r.record_snapshot(kind, result), ok);
            }
            () = shutdown.cancelled() => break,
        }
    }
    tracing::debug!(ticker = %shared.ticker, source = %kind, "Price source stopped");
}
