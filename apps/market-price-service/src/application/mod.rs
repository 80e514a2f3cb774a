//! Application Layer
//!
//! The application layer orchestrates domain logic through use cases.
//! It defines:
//!
//! - **Ports**: Interfaces for the upstream market data provider and poller sources
//! - **Use Cases**: Batch price resolution
//! - **Services**: Cached price access and the client-side price poller

pub mod ports;
pub mod services;
pub mod use_cases;

pub use ports::*;
pub use use_cases::*;
