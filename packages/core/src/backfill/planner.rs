//! Gap planner: decides which dates still need fetching.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::backfill::types::{DateRange, FetchPlan, YearMonth};

/// Dates of `range` missing from `existing`, ascending.
///
/// Unless `allow_partial_month` is set, dates in the calendar month that
/// contains `today` are left out: that month is still in progress and
/// would otherwise be re-checked on every run.
pub fn plan(
    range: &DateRange,
    existing: &BTreeSet<NaiveDate>,
    allow_partial_month: bool,
    today: NaiveDate,
) -> FetchPlan {
    let current_month = YearMonth::of(today);

    range
        .days()
        .filter(|date| !existing.contains(date))
        .filter(|date| allow_partial_month || YearMonth::of(*date) != current_month)
        .filter(|date| *date < today)
        .collect()
}
