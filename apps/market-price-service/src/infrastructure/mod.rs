//! Infrastructure Layer
//!
//! Adapters and runtime plumbing:
//!
//! - [`alpaca`]: Market data REST adapter
//! - [`cache`]: TTL cache with request coalescing
//! - [`config`]: Environment configuration
//! - [`http`]: REST API
//! - [`metrics`]: Prometheus metrics
//! - [`telemetry`]: Logging and trace export

pub mod alpaca;
pub mod cache;
pub mod config;
pub mod http;
pub mod metrics;
pub mod telemetry;
