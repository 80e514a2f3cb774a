//! Application Use Cases
//!
//! Use cases orchestrate domain logic to fulfill application requirements.

mod resolve_batch;

pub use resolve_batch::{
    BatchFetchConfig, BatchOutcome, BatchPrices, BatchValidationError, MAX_BATCH_SIZE,
    ResolveBatchError, ResolveBatchUseCase, SENTINEL_TICKERS, TickerResolutionError,
    validate_batch,
};
