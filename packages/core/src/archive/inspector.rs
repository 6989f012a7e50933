//! Archive inspector.
//!
//! Reports which dates of a range already have a stored row. Problems with
//! an individual record never fail the inspection: the month is logged and
//! treated as holding no dates, so the planner will ask for it again.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::archive::{record_path, MonthlyRecord};
use crate::backfill::types::DateRange;

pub struct ArchiveInspector {
    data_dir: PathBuf,
}

impl ArchiveInspector {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Dates inside `range` that have a row on disk.
    ///
    /// A row counts as present whatever currencies it carries.
    pub fn existing_dates(&self, range: &DateRange) -> BTreeSet<NaiveDate> {
        let mut present = BTreeSet::new();

        for month in range.months() {
            let path = record_path(&self.data_dir, month);
            match MonthlyRecord::load(&path, month) {
                Ok(Some(record)) => {
                    present.extend(record.dates().filter(|date| range.contains(*date)));
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!("Treating {} as empty: {}", month, err);
                }
            }
        }

        tracing::debug!(
            "{} of {} dates in {}..={} already archived",
            present.len(),
            range.len(),
            range.start(),
            range.end()
        );
        present
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn missing_directory_has_no_dates() {
        let dir = tempfile::tempdir().unwrap();
        let inspector = ArchiveInspector::new(dir.path().join("nope"));

        let range = DateRange::new(d(2025, 1, 1), d(2025, 3, 31));
        assert!(inspector.existing_dates(&range).is_empty());
    }

    #[test]
    fn reports_dates_across_months_within_range_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("2024-12.csv"),
            "date,USD\n2024-12-30,1.0\n2024-12-31,1.0\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("2025-01.csv"),
            "date,USD\n2025-01-02,1.0\n2025-01-20,1.0\n",
        )
        .unwrap();
        let inspector = ArchiveInspector::new(dir.path());

        let range = DateRange::new(d(2024, 12, 31), d(2025, 1, 10));
        let present: Vec<_> = inspector.existing_dates(&range).into_iter().collect();

        assert_eq!(present, vec![d(2024, 12, 31), d(2025, 1, 2)]);
    }

    #[test]
    fn rows_with_other_currency_sets_count_as_present() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("2025-01.csv"),
            "date,XAU\n2025-01-05,0.0004\n2025-01-01,\n",
        )
        .unwrap();
        let inspector = ArchiveInspector::new(dir.path());

        let range = DateRange::new(d(2025, 1, 1), d(2025, 1, 31));
        let present = inspector.existing_dates(&range);

        assert!(present.contains(&d(2025, 1, 1)));
        assert!(present.contains(&d(2025, 1, 5)));
    }

    #[test]
    fn malformed_record_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2025-01.csv"), "garbage\n\u{0}\u{1}\n").unwrap();
        fs::write(dir.path().join("2025-02.csv"), "date,USD\n2025-02-01,1.0\n").unwrap();
        let inspector = ArchiveInspector::new(dir.path());

        let range = DateRange::new(d(2025, 1, 1), d(2025, 2, 28));
        let present: Vec<_> = inspector.existing_dates(&range).into_iter().collect();

        assert_eq!(present, vec![d(2025, 2, 1)]);
    }

    #[test]
    fn misfiled_row_does_not_count_as_present() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2025-01.csv"), "date,USD\n2025-02-01,1.0\n").unwrap();
        let inspector = ArchiveInspector::new(dir.path());

        let range = DateRange::new(d(2025, 1, 1), d(2025, 2, 28));

        assert!(inspector.existing_dates(&range).is_empty());
    }
}
