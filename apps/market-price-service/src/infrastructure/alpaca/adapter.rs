//! Alpaca market data REST adapter.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;

use super::api_types::{BarsResponse, LatestQuoteResponse};
use crate::application::ports::{MarketDataError, MarketDataPort, UpstreamOperation};
use crate::domain::market_data::{Bar, QuoteSnapshot, TickerSymbol};
use crate::infrastructure::config::{AlpacaSettings, DataFeed};
use crate::infrastructure::metrics;

/// Calendar days of history requested per trading day of bars wanted.
const LOOKBACK_DAYS_PER_BAR: i64 = 2;
/// Extra calendar days covering long weekends and holidays.
const LOOKBACK_PADDING_DAYS: i64 = 7;

/// Alpaca market data adapter.
///
/// Implements `MarketDataPort` using Alpaca's Market Data v2 REST API.
/// Timeouts are applied per request.
#[derive(Debug)]
pub struct AlpacaMarketDataAdapter {
    client: reqwest::Client,
    api_key: String,
    api_secret: String,
    data_url: reqwest::Url,
    feed: DataFeed,
}

impl AlpacaMarketDataAdapter {
    /// Create a new Alpaca market data adapter.
    pub fn new(settings: &AlpacaSettings) -> Result<Self, MarketDataError> {
        let api_key = settings.credentials.api_key();
        let api_secret = settings.credentials.api_secret();
        if api_key.is_empty() || api_secret.is_empty() {
            return Err(MarketDataError::AuthenticationFailed);
        }

        let data_url =
            reqwest::Url::parse(&settings.data_url).map_err(|e| MarketDataError::ConnectionError {
                message: format!("invalid data url {}: {e}", settings.data_url),
            })?;
        if data_url.cannot_be_a_base() {
            return Err(MarketDataError::ConnectionError {
                message: format!("invalid data url {}", settings.data_url),
            });
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| MarketDataError::ConnectionError {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            data_url,
            feed: settings.feed,
        })
    }

    /// `{data_url}/v2/stocks/{ticker}/{tail...}` with each segment escaped.
    fn stock_url(&self, ticker: &TickerSymbol, tail: &[&str]) -> reqwest::Url {
        let mut url = self.data_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v2", "stocks", ticker.as_str()])
                .extend(tail);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: UpstreamOperation,
        url: reqwest::Url,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<T, MarketDataError> {
        let started = Instant::now();
        let result = self.send(operation, url, query, timeout).await;
        let label = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::record_upstream_request(operation, label, started.elapsed());
        result
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: UpstreamOperation,
        url: reqwest::Url,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<T, MarketDataError> {
        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    operation,
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }
            } else {
                MarketDataError::ConnectionError {
                    message: e.to_string(),
                }
            }
        };

        let response = self
            .client
            .get(url)
            .query(query)
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.api_secret)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(
                operation = %operation,
                status = status.as_u16(),
                body = %body,
                "Alpaca request rejected"
            );
            return Err(match status.as_u16() {
                401 | 403 => MarketDataError::AuthenticationFailed,
                429 => MarketDataError::RateLimited {
                    retry_after_secs: retry_after_secs.unwrap_or(0),
                },
                code => MarketDataError::ApiError {
                    status: code,
                    message: body,
                },
            });
        }

        let body = response.bytes().await.map_err(classify)?;
        serde_json::from_slice(&body).map_err(|e| MarketDataError::MalformedPayload {
            message: format!("{operation}: {e}"),
        })
    }
}

#[async_trait]
impl MarketDataPort for AlpacaMarketDataAdapter {
    async fn latest_quote(
        &self,
        ticker: &TickerSymbol,
        timeout: Duration,
    ) -> Result<Option<QuoteSnapshot>, MarketDataError> {
        let url = self.stock_url(ticker, &["quotes", "latest"]);
        let query = [("feed", self.feed.as_str().to_string())];

        let response: LatestQuoteResponse = self
            .get_json(UpstreamOperation::LatestQuote, url, &query, timeout)
            .await?;

        Ok(response.quote.map(QuoteSnapshot::from))
    }

    async fn recent_bars(
        &self,
        ticker: &TickerSymbol,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let url = self.stock_url(ticker, &["bars"]);
        let lookback_days = i64::try_from(limit)
            .unwrap_or(i64::MAX / LOOKBACK_DAYS_PER_BAR)
            .saturating_mul(LOOKBACK_DAYS_PER_BAR)
            .saturating_add(LOOKBACK_PADDING_DAYS)
            .min(3650);
        let start = Utc::now() - chrono::Duration::days(lookback_days);
        let query = [
            ("timeframe", "1Day".to_string()),
            ("limit", limit.to_string()),
            ("sort", "desc".to_string()),
            ("start", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("feed", self.feed.as_str().to_string()),
        ];

        let response: BarsResponse = self
            .get_json(UpstreamOperation::RecentBars, url, &query, timeout)
            .await?;

        let bars: Vec<Bar> = response
            .bars
            .unwrap_or_default()
            .into_iter()
            .map(Bar::from)
            .collect();
        tracing::debug!(ticker = %ticker, count = bars.len(), "Fetched daily bars");
        Ok(bars)
    }
}
