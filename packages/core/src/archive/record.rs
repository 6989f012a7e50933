//! One calendar month of rates and its CSV representation.
//!
//! A record file starts with a `date` column followed by one column per
//! currency code. Reading is lenient: rows with an unparseable date or a
//! date outside the record's month are dropped, unparseable or blank cells
//! become missing rates, and columns that are not currently tracked are
//! kept so a rewrite never loses them.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use chrono::NaiveDate;

use crate::backfill::error::StorageError;
use crate::backfill::types::{CurrencyRateRow, YearMonth};

const DATE_COLUMN: &str = "date";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyRecord {
    month: YearMonth,
    columns: Vec<String>,
    rows: BTreeMap<NaiveDate, CurrencyRateRow>,
}

impl MonthlyRecord {
    pub fn new(month: YearMonth) -> Self {
        Self {
            month,
            columns: Vec::new(),
            rows: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Dates that have a row, ascending.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.keys().copied()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&CurrencyRateRow> {
        self.rows.get(&date)
    }

    /// Rows in ascending date order.
    pub fn rows(&self) -> impl Iterator<Item = &CurrencyRateRow> {
        self.rows.values()
    }

    /// Insert or replace the row for its date. Returns the replaced row.
    pub fn upsert(&mut self, row: CurrencyRateRow) -> Option<CurrencyRateRow> {
        debug_assert_eq!(YearMonth::of(row.date), self.month);
        self.rows.insert(row.date, row)
    }

    /// Load the record stored at `path`. `Ok(None)` when there is no file.
    pub fn load(path: &Path, month: YearMonth) -> Result<Option<Self>, StorageError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::io(path, err)),
        };

        Self::read_from(file, month, path).map(Some)
    }

    /// Parse a record from CSV. `source` only labels log lines and errors.
    pub fn read_from<R: Read>(
        reader: R,
        month: YearMonth,
        source: &Path,
    ) -> Result<Self, StorageError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let header = reader
            .headers()
            .map_err(|err| StorageError::csv(source, err))?
            .clone();

        let mut record = Self::new(month);
        if header.is_empty() || header.iter().all(str::is_empty) {
            return Ok(record);
        }
        if header.get(0) != Some(DATE_COLUMN) {
            return Err(StorageError::Malformed {
                path: source.to_path_buf(),
                message: format!(
                    "first column is {:?}, expected \"date\"",
                    header.get(0).unwrap_or("")
                ),
            });
        }
        record.columns = header.iter().skip(1).map(str::to_string).collect();

        for result in reader.records() {
            let line = match result {
                Ok(line) => line,
                Err(err) if matches!(err.kind(), csv::ErrorKind::Io(_)) => {
                    return Err(StorageError::csv(source, err));
                }
                Err(err) => {
                    tracing::warn!("Skipping unreadable row in {}: {}", source.display(), err);
                    continue;
                }
            };

            let raw_date = line.get(0).unwrap_or("");
            let date = match NaiveDate::parse_from_str(raw_date, DATE_FORMAT) {
                Ok(date) => date,
                Err(_) => {
                    tracing::warn!(
                        "Skipping row with bad date {:?} in {}",
                        raw_date,
                        source.display()
                    );
                    continue;
                }
            };
            if YearMonth::of(date) != month {
                tracing::warn!(
                    "Skipping row for {} in {}, which holds {}",
                    date,
                    source.display(),
                    month
                );
                continue;
            }

            let mut row = CurrencyRateRow::new(date);
            for (code, cell) in record.columns.iter().zip(line.iter().skip(1)) {
                if cell.is_empty() {
                    continue;
                }
                match cell.parse::<f64>() {
                    Ok(rate) => {
                        row.rates.insert(code.clone(), rate);
                    }
                    Err(_) => tracing::warn!(
                        "Ignoring non-numeric {} rate {:?} for {} in {}",
                        code,
                        cell,
                        date,
                        source.display()
                    ),
                }
            }
            record.rows.insert(date, row);
        }

        Ok(record)
    }

    /// Column order used when writing: tracked codes first, then any
    /// extra codes the existing file carried.
    pub fn output_columns(&self, tracked: &[String]) -> Vec<String> {
        let mut columns = tracked.to_vec();
        for code in &self.columns {
            if !columns.contains(code) {
                columns.push(code.clone());
            }
        }
        columns
    }

    /// Write the record as CSV, rows ascending by date.
    pub fn write_to<W: Write>(&self, writer: W, tracked: &[String]) -> Result<(), csv::Error> {
        let columns = self.output_columns(tracked);
        let mut writer = csv::Writer::from_writer(writer);

        let mut header = Vec::with_capacity(columns.len() + 1);
        header.push(DATE_COLUMN.to_string());
        header.extend(columns.iter().cloned());
        writer.write_record(&header)?;

        for row in self.rows.values() {
            let mut line = Vec::with_capacity(columns.len() + 1);
            line.push(row.date.format(DATE_FORMAT).to_string());
            for code in &columns {
                line.push(row.rate(code).map(|rate| format!("{:?}", rate)).unwrap_or_default());
            }
            writer.write_record(&line)?;
        }

        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn jan() -> YearMonth {
        YearMonth { year: 2025, month: 1 }
    }

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    fn parse(text: &str) -> Result<MonthlyRecord, StorageError> {
        MonthlyRecord::read_from(text.as_bytes(), jan(), Path::new("2025-01.csv"))
    }

    fn render(record: &MonthlyRecord, tracked: &[&str]) -> String {
        let mut out = Vec::new();
        record.write_to(&mut out, &codes(tracked)).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn reads_rows_out_of_order_and_sorts_them() {
        let record = parse("date,USD,EUR\n2025-01-03,1.0,0.93\n2025-01-01,1.0,0.92\n").unwrap();

        assert_eq!(record.dates().collect::<Vec<_>>(), vec![d(2025, 1, 1), d(2025, 1, 3)]);
        assert_eq!(record.get(d(2025, 1, 1)).unwrap().rate("EUR"), Some(0.92));
    }

    #[test]
    fn blank_and_garbage_cells_become_missing_rates() {
        let record = parse("date,USD,EUR,GBP\n2025-01-01,1.0,,n/a\n").unwrap();
        let row = record.get(d(2025, 1, 1)).unwrap();

        assert_eq!(row.rate("USD"), Some(1.0));
        assert_eq!(row.rate("EUR"), None);
        assert_eq!(row.rate("GBP"), None);
    }

    #[test]
    fn truncated_trailing_line_is_skipped() {
        let record = parse("date,USD,EUR\n2025-01-01,1.0,0.92\n2025-01-0").unwrap();

        assert_eq!(record.len(), 1);
    }

    #[test]
    fn rows_from_other_months_are_dropped() {
        let record =
            parse("date,USD,EUR\n2024-12-31,1.0,0.96\n2025-01-02,1.0,0.93\n2025-02-01,1.0,0.9\n")
                .unwrap();

        assert_eq!(record.dates().collect::<Vec<_>>(), vec![d(2025, 1, 2)]);
    }

    #[test]
    fn empty_file_is_an_empty_record() {
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn header_without_date_column_is_malformed() {
        assert!(matches!(parse("USD,EUR\n1.0,0.9\n"), Err(StorageError::Malformed { .. })));
    }

    #[test]
    fn write_uses_tracked_order_and_keeps_extra_columns() {
        let mut record = parse("date,CHF,USD\n2025-01-01,0.91,1.0\n").unwrap();
        let mut row = CurrencyRateRow::new(d(2025, 1, 2));
        row.rates.insert("USD".into(), 1.0);
        row.rates.insert("EUR".into(), 0.92);
        record.upsert(row);

        let text = render(&record, &["USD", "EUR"]);

        assert_eq!(
            text,
            "date,USD,EUR,CHF\n2025-01-01,1.0,,0.91\n2025-01-02,1.0,0.92,\n"
        );
    }

    #[test]
    fn written_record_reads_back_identically() {
        let mut record = MonthlyRecord::new(jan());
        for day in [3, 1, 2] {
            let mut row = CurrencyRateRow::new(d(2025, 1, day));
            row.rates.insert("USD".into(), 1.0);
            row.rates.insert("JPY".into(), 150.0 + f64::from(day) / 7.0);
            record.upsert(row);
        }

        let text = render(&record, &["USD", "JPY"]);
        let reread = parse(&text).unwrap();

        assert_eq!(reread.rows().collect::<Vec<_>>(), record.rows().collect::<Vec<_>>());
    }

    #[test]
    fn upsert_replaces_existing_date() {
        let mut record = MonthlyRecord::new(jan());
        let mut first = CurrencyRateRow::new(d(2025, 1, 1));
        first.rates.insert("EUR".into(), 0.9);
        let mut second = first.clone();
        second.rates.insert("EUR".into(), 0.95);

        assert!(record.upsert(first).is_none());
        assert!(record.upsert(second).is_some());
        assert_eq!(record.len(), 1);
        assert_eq!(record.get(d(2025, 1, 1)).unwrap().rate("EUR"), Some(0.95));
    }

    #[test]
    fn load_of_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = MonthlyRecord::load(&dir.path().join("2025-01.csv"), jan()).unwrap();
        assert!(loaded.is_none());
    }
}
