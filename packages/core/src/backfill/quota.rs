//! Quota tracker.
//!
//! Asks the provider how many requests are left before a pass commits to
//! any work, and folds the client-side per-minute cap into the answer.

use crate::backfill::error::PassError;
use crate::backfill::provider::RateProvider;
use crate::backfill::types::QuotaState;

pub struct QuotaTracker<'a> {
    provider: &'a (dyn RateProvider + Send + Sync),
    max_per_minute: u32,
}

impl<'a> QuotaTracker<'a> {
    pub fn new(provider: &'a (dyn RateProvider + Send + Sync), max_per_minute: u32) -> Self {
        Self {
            provider,
            max_per_minute: max_per_minute.max(1),
        }
    }

    /// Fetch the current quota.
    ///
    /// The minute window is clamped to the configured cap, so
    /// `minute_limit` is always `Some` in the returned state.
    pub async fn check(&self) -> Result<QuotaState, PassError> {
        let reported = self
            .provider
            .status()
            .await
            .map_err(PassError::ProviderUnavailable)?;

        let minute_limit = reported
            .minute_limit
            .map_or(self.max_per_minute, |limit| limit.min(self.max_per_minute))
            .max(1);

        let quota = QuotaState {
            minute_remaining: reported.minute_remaining.min(minute_limit),
            minute_limit: Some(minute_limit),
            ..reported
        };

        tracing::info!(
            "Monthly quota: total={:?} used={:?} remaining={} (minute window {}/{})",
            quota.month_total,
            quota.month_used,
            quota.month_remaining,
            quota.minute_remaining,
            minute_limit,
        );

        Ok(quota)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backfill::error::ProviderError;
    use crate::services::mock_provider::MockRateProvider;

    fn reported(
        minute_remaining: u32,
        minute_limit: Option<u32>,
        month_remaining: u32,
    ) -> QuotaState {
        QuotaState {
            minute_remaining,
            minute_limit,
            month_remaining,
            month_total: Some(5000),
            month_used: Some(5000 - month_remaining),
        }
    }

    #[tokio::test]
    async fn check_clamps_minute_window_to_configured_cap() {
        let provider = MockRateProvider::new().with_quota(reported(u32::MAX, None, 4000));
        let quota = QuotaTracker::new(&provider, 10).check().await.unwrap();

        assert_eq!(quota.minute_limit, Some(10));
        assert_eq!(quota.minute_remaining, 10);
        assert_eq!(quota.month_remaining, 4000);
    }

    #[tokio::test]
    async fn check_keeps_stricter_provider_minute_limit() {
        let provider = MockRateProvider::new().with_quota(reported(2, Some(5), 100));
        let quota = QuotaTracker::new(&provider, 10).check().await.unwrap();

        assert_eq!(quota.minute_limit, Some(5));
        assert_eq!(quota.minute_remaining, 2);
    }

    #[tokio::test]
    async fn check_maps_provider_failure_to_provider_unavailable() {
        let provider = MockRateProvider::new()
            .with_status_error(ProviderError::network("connection refused"));
        let err = QuotaTracker::new(&provider, 10).check().await.unwrap_err();

        assert!(matches!(err, PassError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn check_does_not_issue_rate_requests() {
        let provider = MockRateProvider::new();
        QuotaTracker::new(&provider, 10).check().await.unwrap();

        assert_eq!(provider.historical_calls(), 0);
    }
}
