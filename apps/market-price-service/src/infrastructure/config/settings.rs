//! Service settings read from the process environment.
//!
//! [`ServiceConfig::from_env`] reads everything in one pass. Credentials are
//! required; every other value has a default, and a value that does not parse
//! is logged and replaced by its default. The one exception is the data URL,
//! which must parse because every upstream call is built from it.

use std::str::FromStr;
use std::time::Duration;

use crate::application::services::PricePollerConfig;
use crate::application::use_cases::BatchFetchConfig;
use crate::infrastructure::cache::CacheTtlConfig;

/// Default Alpaca market data base URL.
pub const DEFAULT_DATA_URL: &str = "https://data.alpaca.markets";

/// Alpaca market data feed requested on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataFeed {
    /// Investors Exchange, available on the free plan.
    #[default]
    Iex,
    /// Consolidated tape, requires a paid plan.
    Sip,
}

impl DataFeed {
    /// Query-string value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Iex => "iex",
            Self::Sip => "sip",
        }
    }
}

impl FromStr for DataFeed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("iex") {
            Ok(Self::Iex)
        } else if s.eq_ignore_ascii_case("sip") {
            Ok(Self::Sip)
        } else {
            Err(format!("unknown feed {s:?}, expected iex or sip"))
        }
    }
}

/// Alpaca key pair. `Debug` never prints either half.
#[derive(Clone)]
pub struct Credentials {
    key_id: String,
    secret: String,
}

impl Credentials {
    /// Wrap a key id and secret.
    #[must_use]
    pub const fn new(key_id: String, secret: String) -> Self {
        Self { key_id, secret }
    }

    /// `APCA-API-KEY-ID` header value.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.key_id
    }

    /// `APCA-API-SECRET-KEY` header value.
    #[must_use]
    pub fn api_secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credentials([REDACTED])")
    }
}

/// Upstream connection settings.
#[derive(Debug, Clone)]
pub struct AlpacaSettings {
    /// API credentials.
    pub credentials: Credentials,
    /// Market data base URL.
    pub data_url: String,
    /// Feed requested on every call.
    pub feed: DataFeed,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSettings {
    /// Port for the REST API and `/metrics`.
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { http_port: 8090 }
    }
}

/// Tickers kept warm by in-process pollers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchlistSettings {
    /// Tickers to poll. Empty disables the watchlist.
    pub tickers: Vec<String>,
    /// Poller periods.
    pub poller: PricePollerConfig,
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Upstream connection.
    pub alpaca: AlpacaSettings,
    /// HTTP listener.
    pub server: ServerSettings,
    /// Per-ticker fetch limits.
    pub fetch: BatchFetchConfig,
    /// Cache TTLs.
    pub cache: CacheTtlConfig,
    /// Background watchlist.
    pub watchlist: WatchlistSettings,
}

impl ServiceConfig {
    /// Read the configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Fails when a credential is missing or blank, or when the data URL or
    /// feed name is not recognised.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = EnvReader { lookup };

        let credentials = Credentials::new(env.required("ALPACA_KEY")?, env.required("ALPACA_SECRET")?);

        let data_url = env
            .optional("ALPACA_DATA_URL")
            .unwrap_or_else(|| DEFAULT_DATA_URL.to_string());
        reqwest::Url::parse(&data_url).map_err(|e| ConfigError::InvalidValue {
            key: "ALPACA_DATA_URL".to_string(),
            message: e.to_string(),
        })?;

        let feed = match env.optional("ALPACA_FEED") {
            Some(raw) => raw.parse().map_err(|message| ConfigError::InvalidValue {
                key: "ALPACA_FEED".to_string(),
                message,
            })?,
            None => DataFeed::default(),
        };

        let fetch_defaults = BatchFetchConfig::default();
        let cache_defaults = CacheTtlConfig::default();
        let poller_defaults = PricePollerConfig::default();

        Ok(Self {
            alpaca: AlpacaSettings {
                credentials,
                data_url,
                feed,
            },
            server: ServerSettings {
                http_port: env.parsed_or("PRICE_SERVICE_HTTP_PORT", ServerSettings::default().http_port),
            },
            fetch: BatchFetchConfig {
                quote_timeout: env.millis_or("PRICE_QUOTE_TIMEOUT_MS", fetch_defaults.quote_timeout),
                bars_timeout: env.millis_or("PRICE_BARS_TIMEOUT_MS", fetch_defaults.bars_timeout),
                bars_limit: env.parsed_or("PRICE_BARS_LIMIT", fetch_defaults.bars_limit).max(1),
            },
            cache: CacheTtlConfig {
                direct: env.secs_or("PRICE_DIRECT_TTL_SECS", cache_defaults.direct),
                history: env.secs_or("PRICE_HISTORY_TTL_SECS", cache_defaults.history),
                batch: env.secs_or("PRICE_BATCH_TTL_SECS", cache_defaults.batch),
            },
            watchlist: WatchlistSettings {
                tickers: env.optional("PRICE_WATCHLIST").map(|raw| split_list(&raw)).unwrap_or_default(),
                poller: PricePollerConfig {
                    direct_interval: env.secs_or("PRICE_DIRECT_POLL_SECS", poller_defaults.direct_interval),
                    fallback_interval: env
                        .secs_or("PRICE_FALLBACK_POLL_SECS", poller_defaults.fallback_interval),
                },
            },
        })
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is not set.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Required environment variable is set but blank.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),

    /// Environment variable could not be interpreted.
    #[error("environment variable {key} is invalid: {message}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Error details.
        message: String,
    },
}

/// Typed reads over a key lookup. Blank values count as unset.
struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        match (self.lookup)(key) {
            None => Err(ConfigError::MissingEnvVar(key.to_string())),
            Some(v) if v.trim().is_empty() => Err(ConfigError::EmptyValue(key.to_string())),
            Some(v) => Ok(v),
        }
    }

    fn parsed_or<T: FromStr + Copy + std::fmt::Display>(&self, key: &str, default: T) -> T {
        let Some(raw) = self.optional(key) else {
            return default;
        };
        raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "Ignoring unparseable setting");
            default
        })
    }

    fn secs_or(&self, key: &str, default: Duration) -> Duration {
        Duration::from_secs(self.parsed_or(key, default.as_secs()))
    }

    fn millis_or(&self, key: &str, default: Duration) -> Duration {
        let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(self.parsed_or(key, default_ms))
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    const CREDS: [(&str, &str); 2] = [("ALPACA_KEY", "key123"), ("ALPACA_SECRET", "secret456")];

    #[test]
    fn defaults_apply_with_only_credentials() {
        let config = config_from(&CREDS).unwrap();

        assert_eq!(config.alpaca.data_url, DEFAULT_DATA_URL);
        assert_eq!(config.alpaca.feed, DataFeed::Iex);
        assert_eq!(config.server.http_port, 8090);
        assert_eq!(config.fetch, BatchFetchConfig::default());
        assert_eq!(config.cache, CacheTtlConfig::default());
        assert_eq!(config.watchlist, WatchlistSettings::default());
    }

    #[test]
    fn missing_and_blank_credentials_are_errors() {
        assert_eq!(
            config_from(&[("ALPACA_SECRET", "s")]).unwrap_err(),
            ConfigError::MissingEnvVar("ALPACA_KEY".to_string())
        );
        assert_eq!(
            config_from(&[("ALPACA_KEY", "k"), ("ALPACA_SECRET", "  ")]).unwrap_err(),
            ConfigError::EmptyValue("ALPACA_SECRET".to_string())
        );
    }

    #[test]
    fn overrides_are_read() {
        let mut vars = CREDS.to_vec();
        vars.extend([
            ("ALPACA_FEED", "SIP"),
            ("PRICE_SERVICE_HTTP_PORT", "9000"),
            ("PRICE_QUOTE_TIMEOUT_MS", "1500"),
            ("PRICE_BARS_LIMIT", "0"),
            ("PRICE_BATCH_TTL_SECS", "5"),
            ("PRICE_WATCHLIST", "AAPL, MSFT,,brk.b "),
            ("PRICE_FALLBACK_POLL_SECS", "30"),
        ]);

        let config = config_from(&vars).unwrap();

        assert_eq!(config.alpaca.feed, DataFeed::Sip);
        assert_eq!(config.server.http_port, 9000);
        assert_eq!(config.fetch.quote_timeout, Duration::from_millis(1500));
        assert_eq!(config.fetch.bars_limit, 1);
        assert_eq!(config.cache.batch, Duration::from_secs(5));
        assert_eq!(config.watchlist.tickers, vec!["AAPL", "MSFT", "brk.b"]);
        assert_eq!(config.watchlist.poller.fallback_interval, Duration::from_secs(30));
    }

    #[test]
    fn unparseable_number_falls_back_to_default() {
        let mut vars = CREDS.to_vec();
        vars.push(("PRICE_DIRECT_TTL_SECS", "five minutes"));

        let config = config_from(&vars).unwrap();

        assert_eq!(config.cache.direct, CacheTtlConfig::default().direct);
    }

    #[test]
    fn bad_url_and_unknown_feed_are_errors() {
        let mut vars = CREDS.to_vec();
        vars.push(("ALPACA_DATA_URL", "not a url"));
        assert!(matches!(
            config_from(&vars),
            Err(ConfigError::InvalidValue { key, .. }) if key == "ALPACA_DATA_URL"
        ));

        let mut vars = CREDS.to_vec();
        vars.push(("ALPACA_FEED", "opra"));
        assert!(matches!(
            config_from(&vars),
            Err(ConfigError::InvalidValue { key, .. }) if key == "ALPACA_FEED"
        ));
    }

    #[test]
    fn credentials_never_appear_in_debug() {
        let config = config_from(&CREDS).unwrap();
        let debug = format!("{config:?}");

        assert!(!debug.contains("key123"));
        assert!(!debug.contains("secret456"));
        assert!(debug.contains("[REDACTED]"));
    }
}
