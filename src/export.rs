use crate::CrawlerError;
use rust_xlsxwriter::Workbook;
use std::path::Path;
use tracing::{info, warn};

/// A record that can be laid out as one row of a fixed set of columns.
pub trait Tabular {
    const COLUMNS: &'static [&'static str];
    /// Columns written as numbers in spreadsheets when they hold a value.
    const NUMERIC_COLUMNS: &'static [&'static str];

    /// One cell per column, absent values already rendered as the sentinel.
    fn row(&self) -> Vec<String>;
}

pub fn write_csv<T: Tabular, P: AsRef<Path>>(path: P, records: &[T]) -> Result<usize, CrawlerError> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(T::COLUMNS)?;

    let mut written = 0;
    for (i, record) in records.iter().enumerate() {
        match writer.write_record(record.row()) {
            Ok(()) => written += 1,
            Err(e) => warn!("Skip row {} of {}: {}", i, path.display(), e),
        }
    }
    writer.flush()?;

    info!("Wrote {} rows to {}", written, path.display());
    Ok(written)
}

pub fn write_xlsx<T: Tabular, P: AsRef<Path>>(path: P, records: &[T]) -> Result<usize, CrawlerError> {
    let path = path.as_ref();
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, name) in T::COLUMNS.iter().enumerate() {
        sheet.write_string(0, col as u16, *name)?;
    }

    let mut written = 0;
    for record in records {
        let row = written + 1;
        for (col, (name, value)) in T::COLUMNS.iter().zip(record.row()).enumerate() {
            let number = T::NUMERIC_COLUMNS
                .contains(name)
                .then(|| value.parse::<f64>().ok())
                .flatten();
            match number {
                Some(n) => sheet.write_number(row, col as u16, n)?,
                None => sheet.write_string(row, col as u16, value)?,
            };
        }
        written += 1;
    }

    workbook.save(path)?;
    info!("Wrote {} rows to {}", written, path.display());
    Ok(written as usize)
}
