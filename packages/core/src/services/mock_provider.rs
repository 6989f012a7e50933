//! Scripted in-memory rate provider.
//!
//! Serves a fixed quota and fixed rates, can be told to fail specific
//! dates a number of times, and records the instant of every rate query
//! so tests can check pacing against tokio's (possibly paused) clock.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::time::Instant;

use crate::backfill::error::ProviderError;
use crate::backfill::provider::{ProviderResult, RateProvider};
use crate::backfill::types::QuotaState;

pub struct MockRateProvider {
    quota: QuotaState,
    status_error: Option<ProviderError>,
    rates: HashMap<String, f64>,
    failures: Mutex<HashMap<NaiveDate, VecDeque<ProviderError>>>,
    calls: Mutex<Vec<(NaiveDate, Instant)>>,
}

impl Default for MockRateProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRateProvider {
    /// Unlimited quota, a handful of plausible USD-based rates.
    pub fn new() -> Self {
        let rates = [("USD", 1.0), ("EUR", 0.92), ("GBP", 0.79), ("JPY", 151.3)]
            .into_iter()
            .map(|(code, rate)| (code.to_string(), rate))
            .collect();

        Self {
            quota: QuotaState::unlimited(),
            status_error: None,
            rates,
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_quota(mut self, quota: QuotaState) -> Self {
        self.quota = quota;
        self
    }

    /// Shorthand for a quota with `remaining` monthly requests and an
    /// open minute window.
    pub fn with_month_remaining(self, remaining: u32) -> Self {
        self.with_quota(QuotaState {
            month_remaining: remaining,
            ..QuotaState::unlimited()
        })
    }

    pub fn with_status_error(mut self, error: ProviderError) -> Self {
        self.status_error = Some(error);
        self
    }

    pub fn with_rates(mut self, rates: &[(&str, f64)]) -> Self {
        self.rates = rates
            .iter()
            .map(|(code, rate)| (code.to_string(), *rate))
            .collect();
        self
    }

    /// Fail the next queries for `date` with `errors`, in order. Once they
    /// are used up the date succeeds.
    pub fn with_failures(self, date: NaiveDate, errors: Vec<ProviderError>) -> Self {
        self.failures
            .lock()
            .expect("mock failures lock poisoned")
            .insert(date, errors.into());
        self
    }

    /// Number of rate queries received so far.
    pub fn historical_calls(&self) -> usize {
        self.calls.lock().expect("mock calls lock poisoned").len()
    }

    /// Dates queried, in call order (retries appear more than once).
    pub fn requested_dates(&self) -> Vec<NaiveDate> {
        self.calls
            .lock()
            .expect("mock calls lock poisoned")
            .iter()
            .map(|(date, _)| *date)
            .collect()
    }

    /// Instants at which rate queries arrived.
    pub fn call_instants(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .expect("mock calls lock poisoned")
            .iter()
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl RateProvider for MockRateProvider {
    async fn status(&self) -> ProviderResult<QuotaState> {
        match &self.status_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.quota),
        }
    }

    async fn historical(
        &self,
        date: NaiveDate,
        _base: &str,
        currencies: &[String],
    ) -> ProviderResult<HashMap<String, f64>> {
        self.calls
            .lock()
            .expect("mock calls lock poisoned")
            .push((date, Instant::now()));

        let scripted = self
            .failures
            .lock()
            .expect("mock failures lock poisoned")
            .get_mut(&date)
            .and_then(|queue| queue.pop_front());
        if let Some(err) = scripted {
            return Err(err);
        }

        Ok(self
            .rates
            .iter()
            .filter(|(code, _)| currencies.contains(code))
            .map(|(code, rate)| (code.clone(), *rate))
            .collect())
    }

    fn provider_name(&self) -> &str {
        "Mock"
    }
}
