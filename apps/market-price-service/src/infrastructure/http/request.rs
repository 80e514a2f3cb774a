//! HTTP request DTOs.

use serde::{Deserialize, Serialize};

/// Request body for batch price resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPricesRequest {
    /// Tickers to resolve. Case-sensitive; duplicates collapse.
    pub tickers: Vec<String>,
}
