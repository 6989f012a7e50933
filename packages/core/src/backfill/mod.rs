//! Backfill Module
//!
//! Quota checking, gap planning and rate-limited fetching for one pass
//! over the exchange-rate archive.

pub mod error;
pub mod fetcher;
pub mod pacer;
pub mod planner;
pub mod provider;
pub mod quota;
pub mod retry;
pub mod types;

pub use error::{PassError, ProviderError, StorageError};
pub use fetcher::{FetchSettings, RateLimitedFetcher};
pub use provider::RateProvider;
pub use quota::QuotaTracker;
pub use retry::RetryPolicy;
pub use types::*;
