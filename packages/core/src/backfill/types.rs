//! Core data types for the backfill pass

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::backfill::error::PassError;

/// Inclusive span of calendar dates. Empty when `start > end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// January 1 of `start_year` through the day before `today`.
    ///
    /// The provider never has data for today, so yesterday is the last
    /// date worth asking for.
    pub fn backfill(start_year: i32, today: NaiveDate) -> Self {
        let start = NaiveDate::from_ymd_opt(start_year, 1, 1).unwrap_or(NaiveDate::MAX);
        let end = today.pred_opt().unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days in the range.
    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start).num_days() as usize + 1
        }
    }

    /// Every date in the range, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        let first = if self.is_empty() { None } else { Some(self.start) };
        std::iter::successors(first, move |d| d.succ_opt().filter(|next| *next <= end))
    }

    /// Every calendar month the range touches, ascending.
    pub fn months(&self) -> impl Iterator<Item = YearMonth> {
        let last = YearMonth::of(self.end);
        let first = if self.is_empty() {
            None
        } else {
            Some(YearMonth::of(self.start))
        };
        std::iter::successors(first, move |ym| Some(ym.next()).filter(|next| *next <= last))
    }
}

/// Key of a monthly record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// File name of this month's record, e.g. `2025-01.csv`.
    pub fn file_name(&self) -> String {
        format!("{}.csv", self)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// One day of exchange rates against the base currency.
///
/// Codes missing from `rates` are persisted as blank cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRateRow {
    pub date: NaiveDate,
    pub rates: BTreeMap<String, f64>,
}

impl CurrencyRateRow {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            rates: BTreeMap::new(),
        }
    }

    /// Build a row from a provider response, keeping only tracked codes.
    /// The base currency is always exactly 1.0 regardless of what the
    /// provider sent.
    pub fn from_provider(
        date: NaiveDate,
        base_currency: &str,
        tracked: &[String],
        rates: &HashMap<String, f64>,
    ) -> Self {
        let mut row = Self::new(date);
        for code in tracked {
            if code == base_currency {
                row.rates.insert(code.clone(), 1.0);
            } else if let Some(rate) = rates.get(code) {
                row.rates.insert(code.clone(), *rate);
            }
        }
        row.rates.insert(base_currency.to_string(), 1.0);
        row
    }

    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }
}

/// Remaining request allowance as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaState {
    pub minute_remaining: u32,
    pub minute_limit: Option<u32>,
    pub month_remaining: u32,
    pub month_total: Option<u32>,
    pub month_used: Option<u32>,
}

impl QuotaState {
    /// A quota state with nothing used, mostly for tests and dry runs.
    pub fn unlimited() -> Self {
        Self {
            minute_remaining: u32::MAX,
            minute_limit: None,
            month_remaining: u32::MAX,
            month_total: None,
            month_used: None,
        }
    }
}

/// Monthly requests the fetcher may still issue during this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaBudget {
    remaining: u32,
}

impl QuotaBudget {
    /// Budget for a pass: reported monthly remaining minus the reserve.
    pub fn from_quota(quota: &QuotaState, safety_buffer: u32) -> Self {
        Self {
            remaining: quota.month_remaining.saturating_sub(safety_buffer),
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    pub fn consume(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }
}

/// Dates lacking data, ascending.
pub type FetchPlan = Vec<NaiveDate>;

/// How a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassOutcome {
    /// Every planned date was fetched (or nothing was missing).
    Completed,
    /// Some planned dates were fetched, the rest are left for later.
    PartiallyCompleted,
    /// Nothing was fetched; the next activation picks up the work.
    Deferred,
}

impl PassOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassOutcome::Completed => "completed",
            PassOutcome::PartiallyCompleted => "partially_completed",
            PassOutcome::Deferred => "deferred",
        }
    }
}

impl fmt::Display for PassOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one pass, handed back to the caller.
#[derive(Debug)]
pub struct PassReport {
    pub outcome: PassOutcome,
    pub planned: usize,
    pub fetched: Vec<NaiveDate>,
    pub skipped: Vec<NaiveDate>,
    pub requests_issued: u32,
    pub quota_exhausted: bool,
    pub quota: Option<QuotaState>,
    pub error: Option<PassError>,
}

impl PassReport {
    pub(crate) fn deferred(error: Option<PassError>) -> Self {
        Self {
            outcome: PassOutcome::Deferred,
            planned: 0,
            fetched: Vec::new(),
            skipped: Vec::new(),
            requests_issued: 0,
            quota_exhausted: false,
            quota: None,
            error,
        }
    }

    pub fn fetched_count(&self) -> usize {
        self.fetched.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Derive the outcome from what a pass managed to do.
pub fn classify_outcome(planned: usize, fetched: usize) -> PassOutcome {
    if fetched == planned {
        PassOutcome::Completed
    } else if fetched > 0 {
        PassOutcome::PartiallyCompleted
    } else {
        PassOutcome::Deferred
    }
}
