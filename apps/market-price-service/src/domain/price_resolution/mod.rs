//! Price Resolution Bounded Context
//!
//! Turns a quote snapshot and a handful of daily bars into a
//! [`ResolvedPrice`](crate::domain::market_data::ResolvedPrice) by walking
//! ordered candidate lists and taking the first usable value.

mod candidates;
mod errors;
mod resolver;

pub use candidates::{
    CURRENT_PRICE_CANDIDATES, PREVIOUS_CLOSE_CANDIDATES, PriceCandidate, ResolutionInputs,
    first_valid,
};
pub use errors::ResolutionError;
pub use resolver::{daily_change, resolve};
