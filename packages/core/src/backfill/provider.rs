//! Rate Provider Interface
//!
//! Abstraction over the remote exchange-rate service so the pass can run
//! against the real HTTP client or a scripted mock.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::backfill::{error::ProviderError, types::QuotaState};

/// Trait for exchange-rate providers
#[async_trait]
pub trait RateProvider {
    /// Remaining request allowance. Must not count against the quota.
    async fn status(&self) -> ProviderResult<QuotaState>;

    /// Rates for a single date, keyed by currency code, relative to `base`.
    async fn historical(
        &self,
        date: NaiveDate,
        base: &str,
        currencies: &[String],
    ) -> ProviderResult<HashMap<String, f64>>;

    /// Get the name of this provider for logging/debugging
    fn provider_name(&self) -> &str;
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;
