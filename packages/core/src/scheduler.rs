//! Backfill pass scheduler.
//!
//! Drives one pass over the archive: check the provider quota, find the
//! dates that have no stored row yet, fetch them oldest first under the
//! rate limits, and merge each fetched row into its monthly record before
//! asking for the next one.

use crate::archive::{ArchiveInspector, MonthlyWriter};
use crate::backfill::planner;
use crate::backfill::{
    classify_outcome, DateRange, FetchPlan, PassError, PassOutcome, PassReport, QuotaState,
    QuotaTracker, RateLimitedFetcher, RateProvider,
};
use crate::clock::Clock;
use crate::config::Config;

/// Result of the planning half of a pass.
#[derive(Debug, Clone)]
pub struct PlannedPass {
    pub quota: QuotaState,
    pub range: DateRange,
    pub plan: FetchPlan,
}

/// Check quota, inspect the archive and build the fetch plan.
///
/// Issues no rate queries and writes nothing.
pub async fn plan_backfill_pass(
    provider: &(dyn RateProvider + Send + Sync),
    clock: &dyn Clock,
    config: &Config,
) -> Result<PlannedPass, PassError> {
    let quota = QuotaTracker::new(provider, config.max_requests_per_minute)
        .check()
        .await?;

    let today = clock.today();
    let range = DateRange::backfill(config.start_year, today);
    let existing = ArchiveInspector::new(&config.data_dir).existing_dates(&range);
    let plan = planner::plan(&range, &existing, config.allow_partial_month, today);

    if let (Some(first), Some(last)) = (plan.first(), plan.last()) {
        tracing::info!("Planned {} missing dates ({} to {})", plan.len(), first, last);
    }

    Ok(PlannedPass { quota, range, plan })
}

/// Run one complete backfill pass.
///
/// Never fails: provider, fetch and storage errors end the pass early and
/// are carried in [`PassReport::error`].
pub async fn run_backfill_pass(
    provider: &(dyn RateProvider + Send + Sync),
    clock: &dyn Clock,
    config: &Config,
) -> PassReport {
    tracing::info!(
        "Starting backfill pass via {} (base={}, allow partial={})",
        provider.provider_name(),
        config.base_currency,
        config.allow_partial_month,
    );

    let PlannedPass { quota, plan, .. } = match plan_backfill_pass(provider, clock, config).await {
        Ok(planned) => planned,
        Err(err) => {
            tracing::error!("Cannot obtain status from provider, deferring pass: {}", err);
            return PassReport::deferred(Some(err));
        }
    };

    let mut report = PassReport {
        outcome: PassOutcome::Completed,
        planned: plan.len(),
        fetched: Vec::new(),
        skipped: Vec::new(),
        requests_issued: 0,
        quota_exhausted: false,
        quota: Some(quota),
        error: None,
    };

    if plan.is_empty() {
        tracing::info!("No missing data found since {}. Nothing to do.", config.start_year);
        return report;
    }

    let settings = config.fetch_settings();
    let writer = MonthlyWriter::new(&config.data_dir, config.currencies.clone());
    let mut fetcher = RateLimitedFetcher::new(provider, plan, &quota, &settings);

    while let Some(item) = fetcher.next().await {
        let row = match item {
            Ok(row) => row,
            Err(err) => {
                report.error = Some(err);
                break;
            }
        };

        if let Err(source) = writer.merge(&row) {
            tracing::error!("Failed to store rates for {}: {}", row.date, source);
            report.error = Some(PassError::StorageWrite {
                date: row.date,
                source,
            });
            break;
        }
        report.fetched.push(row.date);
    }

    report.requests_issued = fetcher.requests_issued();
    report.skipped = fetcher.skipped().to_vec();
    report.quota_exhausted = fetcher.quota_exhausted();
    report.outcome = classify_outcome(report.planned, report.fetched.len());

    tracing::info!(
        "Pass {}: fetched {} of {} planned dates, skipped {}, {} requests issued{}",
        report.outcome,
        report.fetched_count(),
        report.planned,
        report.skipped_count(),
        report.requests_issued,
        if report.quota_exhausted { ", quota exhausted" } else { "" },
    );

    report
}
