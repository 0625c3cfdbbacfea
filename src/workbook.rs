//! Spreadsheet input. The first worksheet is turned into the same header and
//! string rows the delimited-text loader sees.

use std::path::Path;

use calamine::{open_workbook_auto, Data, DataType, Range, Reader};
use chrono::Datelike;

use crate::{
    error::{Error, RowParseWarning},
    export::TIMESTAMP_FORMAT,
    loader::{parse_row, ColumnMap, LoadedTable},
};

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

pub fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| {
            WORKBOOK_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str())
        })
}

pub fn load_workbook(path: &Path) -> Result<LoadedTable, Error> {
    let failure = |e: calamine::Error| Error::ReadFailure(format!("{}: {}", path.display(), e));

    let mut workbook = open_workbook_auto(path).map_err(failure)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::ReadFailure(format!("{}: workbook has no worksheets", path.display())))?
        .map_err(failure)?;
    load_range(&range)
}

/// Loads a worksheet whose first used row is the header.
pub fn load_range(range: &Range<Data>) -> Result<LoadedTable, Error> {
    let mut rows = range.rows();
    let headers = rows.next().map(to_record).unwrap_or_default();
    let columns = ColumnMap::resolve(&headers)?;

    // 1-based sheet row of the header
    let header_line = range.start().map_or(1, |(row, _)| u64::from(row) + 1);
    let mut table = LoadedTable::default();
    for (offset, row) in rows.enumerate() {
        let line = header_line + 1 + offset as u64;
        table.push(
            parse_row(&to_record(row), &columns).map_err(|reason| RowParseWarning { line, reason }),
        );
    }
    Ok(table.finish())
}

fn to_record(row: &[Data]) -> csv::StringRecord {
    csv::StringRecord::from(row.iter().map(cell_text).collect::<Vec<_>>())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        // time-only cells sit on the 1899-12-30 epoch
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) if dt.year() < 1900 => dt.time().format("%H:%M:%S").to_string(),
            Some(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
            None => cell.to_string(),
        },
        Data::Error(e) => format!("#{:?}", e),
    }
}
