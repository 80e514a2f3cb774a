//! Configuration Module
//!
//! Configuration loading for the price service.

mod settings;

pub use settings::{
    AlpacaSettings, ConfigError, Credentials, DataFeed, ServerSettings, ServiceConfig,
    WatchlistSettings,
};
