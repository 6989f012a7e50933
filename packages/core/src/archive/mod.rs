//! On-disk archive of monthly rate records.
//!
//! One CSV file per calendar month, named `YYYY-MM.csv`, inside the data
//! directory. The directory contents are the only record of progress: a
//! pass learns what is already stored by reading them again.

pub mod inspector;
pub mod record;
pub mod writer;

use std::path::{Path, PathBuf};

use crate::backfill::types::YearMonth;

pub use inspector::ArchiveInspector;
pub use record::MonthlyRecord;
pub use writer::MonthlyWriter;

/// Location of the record for `month` inside `data_dir`.
pub fn record_path(data_dir: &Path, month: YearMonth) -> PathBuf {
    data_dir.join(month.file_name())
}
