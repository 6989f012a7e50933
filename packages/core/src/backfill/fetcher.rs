//! Rate-limited fetcher.
//!
//! Walks a [`FetchPlan`] in order and yields one [`CurrencyRateRow`] per
//! successfully fetched date. Rows come out one at a time through
//! [`RateLimitedFetcher::next`] so the caller can persist each before the
//! next request is issued.
//!
//! Every request issued, retries included, is charged against both the
//! monthly budget and the minute window.

use std::time::Duration;

use chrono::NaiveDate;

use crate::backfill::error::{PassError, ProviderError};
use crate::backfill::pacer::MinutePacer;
use crate::backfill::provider::RateProvider;
use crate::backfill::retry::RetryPolicy;
use crate::backfill::types::{CurrencyRateRow, FetchPlan, QuotaBudget, QuotaState};

/// Per-pass fetch parameters taken from configuration.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub base_currency: String,
    pub currencies: Vec<String>,
    pub max_per_minute: u32,
    pub safety_buffer: u32,
    pub retry: RetryPolicy,
}

impl FetchSettings {
    pub fn new(base_currency: impl Into<String>, currencies: Vec<String>) -> Self {
        Self {
            base_currency: base_currency.into(),
            currencies,
            max_per_minute: 10,
            safety_buffer: 0,
            retry: RetryPolicy::default(),
        }
    }
}

/// What happened to a single planned date.
enum DateOutcome {
    Fetched(CurrencyRateRow),
    Skipped,
    QuotaExhausted,
    Fatal(ProviderError),
}

pub struct RateLimitedFetcher<'a> {
    provider: &'a (dyn RateProvider + Send + Sync),
    settings: &'a FetchSettings,
    plan: std::vec::IntoIter<NaiveDate>,
    budget: QuotaBudget,
    pacer: MinutePacer,
    requests_issued: u32,
    skipped: Vec<NaiveDate>,
    quota_exhausted: bool,
    finished: bool,
}

impl<'a> RateLimitedFetcher<'a> {
    pub fn new(
        provider: &'a (dyn RateProvider + Send + Sync),
        plan: FetchPlan,
        quota: &QuotaState,
        settings: &'a FetchSettings,
    ) -> Self {
        let max_per_minute = settings.max_per_minute.max(1);
        let minute_limit = quota
            .minute_limit
            .map_or(max_per_minute, |limit| limit.min(max_per_minute));

        Self {
            provider,
            settings,
            plan: plan.into_iter(),
            budget: QuotaBudget::from_quota(quota, settings.safety_buffer),
            pacer: MinutePacer::seeded(minute_limit, quota.minute_remaining),
            requests_issued: 0,
            skipped: Vec::new(),
            quota_exhausted: false,
            finished: false,
        }
    }

    /// Fetch the next planned date that succeeds.
    ///
    /// Returns `None` once the plan is exhausted or the monthly budget runs
    /// out, and `Some(Err(_))` exactly once on a fatal failure, after which
    /// the sequence is finished.
    pub async fn next(&mut self) -> Option<Result<CurrencyRateRow, PassError>> {
        if self.finished {
            return None;
        }

        while let Some(date) = self.plan.next() {
            match self.fetch_date(date).await {
                DateOutcome::Fetched(row) => return Some(Ok(row)),
                DateOutcome::Skipped => self.skipped.push(date),
                DateOutcome::QuotaExhausted => {
                    tracing::info!(
                        "Quota exhausted before {}; {} planned dates left for the next pass",
                        date,
                        self.plan.len() + 1,
                    );
                    self.quota_exhausted = true;
                    self.finished = true;
                    return None;
                }
                DateOutcome::Fatal(source) => {
                    tracing::error!("Fatal error fetching {}: {}", date, source);
                    self.finished = true;
                    return Some(Err(PassError::FatalFetch { date, source }));
                }
            }
        }

        self.finished = true;
        None
    }

    async fn fetch_date(&mut self, date: NaiveDate) -> DateOutcome {
        let retry = self.settings.retry;
        let mut attempt = 0;

        loop {
            if self.budget.is_exhausted() {
                return DateOutcome::QuotaExhausted;
            }

            self.pacer.acquire().await;
            self.budget.consume();
            self.requests_issued += 1;

            tracing::debug!("Fetching {}", date);
            let result = self
                .provider
                .historical(date, &self.settings.base_currency, &self.settings.currencies)
                .await;

            let err = match result {
                Ok(rates) => {
                    return DateOutcome::Fetched(CurrencyRateRow::from_provider(
                        date,
                        &self.settings.base_currency,
                        &self.settings.currencies,
                        &rates,
                    ))
                }
                Err(err) => err,
            };

            if matches!(err, ProviderError::RateLimitExceeded) {
                tracing::warn!("{} refused {} with 429", self.provider.provider_name(), date);
                return DateOutcome::QuotaExhausted;
            }
            if err.is_fatal() {
                return DateOutcome::Fatal(err);
            }
            if !err.is_transient() {
                tracing::warn!("Skipping {}: {}", date, err);
                return DateOutcome::Skipped;
            }
            if attempt >= retry.max_retries {
                tracing::warn!(
                    "Skipping {} after {} attempts: {}",
                    date,
                    attempt + 1,
                    err
                );
                return DateOutcome::Skipped;
            }

            let delay = retry.delay_for_attempt(attempt);
            attempt += 1;
            tracing::warn!(
                "Request for {} failed: {}. Retry {}/{} in {:.1}s",
                date,
                err,
                attempt,
                retry.max_retries,
                delay.as_secs_f64(),
            );
            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Requests sent to the provider so far, retries included.
    pub fn requests_issued(&self) -> u32 {
        self.requests_issued
    }

    /// Dates given up on after retrying or being rejected.
    pub fn skipped(&self) -> &[NaiveDate] {
        &self.skipped
    }

    pub fn quota_exhausted(&self) -> bool {
        self.quota_exhausted
    }

    pub fn budget_remaining(&self) -> u32 {
        self.budget.remaining()
    }
}
