//! Monthly writer.
//!
//! Sole writer of record files. Each merge rewrites the whole month into a
//! temporary file in the data directory and renames it over the record, so
//! a crash leaves either the old or the new file, never a mix.
//!
//! A record that exists but cannot be parsed is renamed to
//! `YYYY-MM.csv.corrupt-<unix seconds>` and the month starts over. The
//! inspector already reports such a month as empty, so its dates are all
//! planned again.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::NamedTempFile;

use crate::archive::{record_path, MonthlyRecord};
use crate::backfill::error::StorageError;
use crate::backfill::types::{CurrencyRateRow, YearMonth};

pub struct MonthlyWriter {
    data_dir: PathBuf,
    currencies: Vec<String>,
}

impl MonthlyWriter {
    pub fn new(data_dir: impl Into<PathBuf>, currencies: Vec<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            currencies,
        }
    }

    /// Insert or replace `row` in its month's record and persist it.
    ///
    /// Merging the same row twice leaves the file byte-for-byte unchanged.
    /// An unparseable record is moved aside first; a record that cannot be
    /// opened at all fails the merge.
    pub fn merge(&self, row: &CurrencyRateRow) -> Result<(), StorageError> {
        let month = YearMonth::of(row.date);
        let path = record_path(&self.data_dir, month);

        let mut record = match MonthlyRecord::load(&path, month) {
            Ok(Some(record)) => record,
            Ok(None) => MonthlyRecord::new(month),
            Err(err) if err.is_unreadable_record() => {
                let moved_to = quarantine(&path)?;
                tracing::warn!(
                    "Moved unreadable record to {} and starting {} afresh: {}",
                    moved_to.display(),
                    month,
                    err
                );
                MonthlyRecord::new(month)
            }
            Err(err) => return Err(err),
        };
        if record.upsert(row.clone()).is_some() {
            tracing::debug!("Replaced existing row for {}", row.date);
        }

        self.persist(&path, &record)?;
        tracing::debug!("{} now holds {} rows", path.display(), record.len());
        Ok(())
    }

    fn persist(&self, path: &Path, record: &MonthlyRecord) -> Result<(), StorageError> {
        fs::create_dir_all(&self.data_dir).map_err(|err| StorageError::io(&self.data_dir, err))?;

        let mut tmp = NamedTempFile::new_in(&self.data_dir)
            .map_err(|err| StorageError::io(&self.data_dir, err))?;

        record
            .write_to(tmp.as_file_mut(), &self.currencies)
            .map_err(|err| StorageError::csv(tmp.path(), err))?;
        tmp.as_file_mut()
            .flush()
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|err| StorageError::io(tmp.path(), err))?;

        tmp.persist(path).map_err(|err| StorageError::Persist {
            path: path.to_path_buf(),
            source: err.error,
        })?;
        Ok(())
    }
}

/// Rename `path` out of the way, keeping its contents for inspection.
fn quarantine(path: &Path) -> Result<PathBuf, StorageError> {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".corrupt-{}", Utc::now().timestamp()));
    let target = PathBuf::from(name);

    fs::rename(path, &target).map_err(|err| StorageError::io(path, err))?;
    Ok(target)
}
