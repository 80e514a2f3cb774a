//! Alpaca Adapter Integration Tests
//!
//! Runs the REST adapter against a local mock of the market data API.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use market_price_service::AlpacaMarketDataAdapter;
use market_price_service::TickerSymbol;
use market_price_service::application::ports::{MarketDataError, MarketDataPort, UpstreamOperation};
use market_price_service::infrastructure::config::{AlpacaSettings, Credentials, DataFeed};

const TIMEOUT: Duration = Duration::from_secs(2);

fn adapter_for(server: &MockServer) -> AlpacaMarketDataAdapter {
    let settings = AlpacaSettings {
        credentials: Credentials::new("test-key".to_string(), "test-secret".to_string()),
        data_url: server.uri(),
        feed: DataFeed::Iex,
    };
    AlpacaMarketDataAdapter::new(&settings).unwrap()
}

fn aapl() -> TickerSymbol {
    TickerSymbol::new("AAPL")
}

#[tokio::test]
async fn latest_quote_sends_credentials_and_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/stocks/AAPL/quotes/latest"))
        .and(header("APCA-API-KEY-ID", "test-key"))
        .and(header("APCA-API-SECRET-KEY", "test-secret"))
        .and(query_param("feed", "iex"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "symbol": "AAPL",
            "quote": {"ap": 190.25, "as": 3, "bp": 190.10, "bs": 1, "t": "2024-03-01T20:59:59Z"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let quote = adapter_for(&server)
        .latest_quote(&aapl(), TIMEOUT)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(quote.ask, Some(190.25));
    assert_eq!(quote.bid, Some(190.10));
}

#[tokio::test]
async fn latest_quote_zero_side_is_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/stocks/AAPL/quotes/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "symbol": "AAPL",
            "quote": {"ap": 0, "bp": 189.5, "t": "2024-03-01T20:59:59Z"}
        })))
        .mount(&server)
        .await;

    let quote = adapter_for(&server)
        .latest_quote(&aapl(), TIMEOUT)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(quote.ask, None);
    assert_eq!(quote.bid, Some(189.5));
}

#[tokio::test]
async fn latest_quote_missing_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/stocks/AAPL/quotes/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"symbol": "AAPL"})))
        .mount(&server)
        .await;

    let quote = adapter_for(&server)
        .latest_quote(&aapl(), TIMEOUT)
        .await
        .unwrap();

    assert!(quote.is_none());
}

#[tokio::test]
async fn recent_bars_requests_daily_descending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/stocks/AAPL/bars"))
        .and(query_param("timeframe", "1Day"))
        .and(query_param("limit", "10"))
        .and(query_param("sort", "desc"))
        .and(query_param("feed", "iex"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "symbol": "AAPL",
            "bars": [
                {"o": 1.0, "h": 1.0, "l": 1.0, "c": 101.5, "v": 10, "t": "2024-03-01T05:00:00Z"},
                {"o": 1.0, "h": 1.0, "l": 1.0, "c": 100.0, "v": 10, "t": "2024-02-29T05:00:00Z"}
            ],
            "next_page_token": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let bars = adapter_for(&server)
        .recent_bars(&aapl(), 10, TIMEOUT)
        .await
        .unwrap();

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    assert_eq!(closes, vec![101.5, 100.0]);
}

#[tokio::test]
async fn recent_bars_null_list_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/stocks/AAPL/bars"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"symbol": "AAPL", "bars": null})))
        .mount(&server)
        .await;

    let bars = adapter_for(&server)
        .recent_bars(&aapl(), 10, TIMEOUT)
        .await
        .unwrap();

    assert!(bars.is_empty());
}

#[tokio::test]
async fn server_error_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = adapter_for(&server)
        .recent_bars(&aapl(), 10, TIMEOUT)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        MarketDataError::ApiError {
            status: 500,
            message: "upstream down".to_string(),
        }
    );
}

#[tokio::test]
async fn unauthorized_maps_to_authentication_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = adapter_for(&server)
        .latest_quote(&aapl(), TIMEOUT)
        .await
        .unwrap_err();

    assert_eq!(err, MarketDataError::AuthenticationFailed);
}

#[tokio::test]
async fn too_many_requests_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let err = adapter_for(&server)
        .latest_quote(&aapl(), TIMEOUT)
        .await
        .unwrap_err();

    assert_eq!(err, MarketDataError::RateLimited { retry_after_secs: 7 });
}

#[tokio::test]
async fn unparseable_body_is_malformed_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = adapter_for(&server)
        .recent_bars(&aapl(), 10, TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(err, MarketDataError::MalformedPayload { .. }));
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"symbol": "AAPL"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let err = adapter_for(&server)
        .latest_quote(&aapl(), Duration::from_millis(50))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        MarketDataError::Timeout {
            operation: UpstreamOperation::LatestQuote,
            timeout_ms: 50,
        }
    );
}

#[test]
fn blank_credentials_are_rejected() {
    let settings = AlpacaSettings {
        credentials: Credentials::new(String::new(), "secret".to_string()),
        data_url: "https://data.alpaca.markets".to_string(),
        feed: DataFeed::Sip,
    };

    assert_eq!(
        AlpacaMarketDataAdapter::new(&settings).unwrap_err(),
        MarketDataError::AuthenticationFailed
    );
}
