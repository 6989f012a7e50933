//! Prometheus metrics for backfill passes.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. The process runs one pass and exits, so instead of serving
//! `/metrics` the registry is rendered once at the end of the pass and
//! written to a textfile for node-exporter's textfile collector.

use std::io::Write;
use std::path::Path;

use chrono::Utc;
use prometheus::{Counter, Gauge, GaugeVec, Opts, Registry};
use tempfile::NamedTempFile;

use crate::backfill::types::{PassOutcome, PassReport};

/// All application-level Prometheus metrics.
pub struct AppMetrics {
    /// Rate queries sent to the provider, retries included.
    pub requests_total: Counter,
    /// Dates fetched and merged into a monthly record.
    pub dates_fetched_total: Counter,
    /// Dates given up on after retries or rejection.
    pub dates_skipped_total: Counter,
    /// Dates the last plan contained.
    pub dates_planned: Gauge,
    /// Monthly quota remaining as reported at pass start.
    pub quota_month_remaining: Gauge,
    /// 1 for the outcome of the last pass, 0 for the others.
    pub pass_outcome: GaugeVec,
    /// 1 when the last pass stopped on quota exhaustion.
    pub quota_exhausted: Gauge,
    /// Unix time the last pass finished.
    pub last_pass_timestamp_seconds: Gauge,
    /// The registry that owns all of the above metrics.
    pub registry: Registry,
}

impl AppMetrics {
    /// Create and register all metrics. Returns an error if any metric
    /// name is invalid or duplicated.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = Counter::with_opts(Opts::new(
            "fx_archive_requests_total",
            "Rate queries sent to the provider",
        ))?;

        let dates_fetched_total = Counter::with_opts(Opts::new(
            "fx_archive_dates_fetched_total",
            "Dates fetched and stored",
        ))?;

        let dates_skipped_total = Counter::with_opts(Opts::new(
            "fx_archive_dates_skipped_total",
            "Dates skipped after transient failures or rejection",
        ))?;

        let dates_planned = Gauge::with_opts(Opts::new(
            "fx_archive_dates_planned",
            "Missing dates in the last fetch plan",
        ))?;

        let quota_month_remaining = Gauge::with_opts(Opts::new(
            "fx_archive_quota_month_remaining",
            "Monthly provider quota remaining at pass start",
        ))?;

        let pass_outcome = GaugeVec::new(
            Opts::new("fx_archive_pass_outcome", "Outcome of the last pass"),
            &["outcome"],
        )?;

        let quota_exhausted = Gauge::with_opts(Opts::new(
            "fx_archive_quota_exhausted",
            "Whether the last pass stopped because quota ran out",
        ))?;

        let last_pass_timestamp_seconds = Gauge::with_opts(Opts::new(
            "fx_archive_last_pass_timestamp_seconds",
            "Unix time the last pass finished",
        ))?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(dates_fetched_total.clone()))?;
        registry.register(Box::new(dates_skipped_total.clone()))?;
        registry.register(Box::new(dates_planned.clone()))?;
        registry.register(Box::new(quota_month_remaining.clone()))?;
        registry.register(Box::new(pass_outcome.clone()))?;
        registry.register(Box::new(quota_exhausted.clone()))?;
        registry.register(Box::new(last_pass_timestamp_seconds.clone()))?;

        Ok(Self {
            requests_total,
            dates_fetched_total,
            dates_skipped_total,
            dates_planned,
            quota_month_remaining,
            pass_outcome,
            quota_exhausted,
            last_pass_timestamp_seconds,
            registry,
        })
    }

    /// Record the results of a finished pass.
    pub fn observe_pass(&self, report: &PassReport) {
        self.requests_total.inc_by(f64::from(report.requests_issued));
        self.dates_fetched_total.inc_by(report.fetched_count() as f64);
        self.dates_skipped_total.inc_by(report.skipped_count() as f64);
        self.dates_planned.set(report.planned as f64);
        if let Some(quota) = &report.quota {
            self.quota_month_remaining.set(f64::from(quota.month_remaining));
        }

        for outcome in [
            PassOutcome::Completed,
            PassOutcome::PartiallyCompleted,
            PassOutcome::Deferred,
        ] {
            let value = if outcome == report.outcome { 1.0 } else { 0.0 };
            self.pass_outcome
                .with_label_values(&[outcome.as_str()])
                .set(value);
        }

        self.quota_exhausted
            .set(if report.quota_exhausted { 1.0 } else { 0.0 });
        self.last_pass_timestamp_seconds
            .set(Utc::now().timestamp() as f64);
    }

    /// Render all metrics as Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }

    /// Write the rendered metrics to `path`, replacing it atomically so the
    /// collector never reads a half-written file.
    pub fn write_textfile(&self, path: &Path) -> std::io::Result<()> {
        let body = self
            .render()
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(body.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|err| err.error)?;
        Ok(())
    }
}
