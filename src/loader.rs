use std::{fs::File, io::Read, path::Path, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use tracing::{debug, info, warn};

use crate::{
    error::{Error, RowError, RowParseWarning},
    transaction::Transaction,
    workbook,
};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%Y/%m/%d"];

/// Largest accepted amount, 10^15. Sums over any table that fits in memory
/// stay far below `Decimal::MAX`, so aggregation never overflows.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M", "%I:%M %p", "%I:%M:%S %p"];

const COLUMN_COUNT: usize = 11;

/// Columns understood by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Timestamp,
    Time,
    Amount,
    PaymentMethod,
    TransactionType,
    Status,
    City,
    Merchant,
    Bank,
    RemainingBalance,
    CustomerAge,
}

impl Column {
    pub const ALL: [Column; COLUMN_COUNT] = [
        Column::Timestamp,
        Column::Time,
        Column::Amount,
        Column::PaymentMethod,
        Column::TransactionType,
        Column::Status,
        Column::City,
        Column::Merchant,
        Column::Bank,
        Column::RemainingBalance,
        Column::CustomerAge,
    ];

    /// Canonical name, as written by the exporter.
    pub fn name(self) -> &'static str {
        match self {
            Column::Timestamp => "timestamp",
            Column::Time => "time",
            Column::Amount => "amount",
            Column::PaymentMethod => "payment_method",
            Column::TransactionType => "transaction_type",
            Column::Status => "status",
            Column::City => "city",
            Column::Merchant => "merchant",
            Column::Bank => "bank",
            Column::RemainingBalance => "remaining_balance",
            Column::CustomerAge => "customer_age",
        }
    }

    /// Accepted headers, already in normalized form.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::Timestamp => &["timestamp", "transactiondate", "date", "datetime"],
            Column::Time => &["time", "transactiontime"],
            Column::Amount => &["amount"],
            Column::PaymentMethod => &["paymentmethod", "method"],
            Column::TransactionType => &["transactiontype", "type"],
            Column::Status => &["status"],
            Column::City => &["city"],
            Column::Merchant => &["merchant", "merchantname"],
            Column::Bank => &["bank", "banknamesent"],
            Column::RemainingBalance => &["remainingbalance"],
            Column::CustomerAge => &["customerage"],
        }
    }

    pub fn is_required(self) -> bool {
        matches!(
            self,
            Column::Timestamp
                | Column::Amount
                | Column::PaymentMethod
                | Column::TransactionType
                | Column::Status
        )
    }
}

/// Lowercases and drops whitespace, `_` and `-`, so `Payment Method`,
/// `payment_method` and `PaymentMethod` all compare equal.
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Position of every known column in the source header.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ColumnMap {
    indices: [Option<usize>; COLUMN_COUNT],
}

impl ColumnMap {
    /// Matches the header row against the known columns. The first header
    /// matching a column wins; unknown headers are ignored.
    pub fn resolve(headers: &csv::StringRecord) -> Result<Self, Error> {
        let mut map = ColumnMap::default();
        for (position, header) in headers.iter().enumerate() {
            let normalized = normalize_header(header);
            let column = Column::ALL
                .iter()
                .copied()
                .find(|c| c.aliases().contains(&normalized.as_str()));
            if let Some(column) = column {
                let slot = &mut map.indices[column as usize];
                if slot.is_none() {
                    *slot = Some(position);
                }
            }
        }

        let missing: Vec<String> = Column::ALL
            .iter()
            .filter(|c| c.is_required() && map.index(**c).is_none())
            .map(|c| c.name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::Schema { missing });
        }
        Ok(map)
    }

    pub fn index(&self, column: Column) -> Option<usize> {
        self.indices[column as usize]
    }

    /// The trimmed cell for `column`, or `None` when the column is absent or
    /// the cell is empty.
    fn cell<'r>(&self, record: &'r csv::StringRecord, column: Column) -> Option<&'r str> {
        self.index(column)
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn required<'r>(
        &self,
        record: &'r csv::StringRecord,
        column: Column,
    ) -> Result<&'r str, RowError> {
        self.cell(record, column)
            .ok_or_else(|| RowError::MissingField(column.name()))
    }
}

/// The in-memory table produced by a load, in source row order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadedTable {
    pub transactions: Vec<Transaction>,
    pub warnings: Vec<RowParseWarning>,
}

impl LoadedTable {
    pub fn skipped_rows(&self) -> usize {
        self.warnings.len()
    }

    pub(crate) fn push(&mut self, row: Result<Transaction, RowParseWarning>) {
        match row {
            Ok(transaction) => self.transactions.push(transaction),
            Err(warning) => {
                debug!("{}", warning);
                self.warnings.push(warning);
            }
        }
    }

    pub(crate) fn finish(self) -> Self {
        if self.skipped_rows() > 0 {
            warn!(skipped = self.skipped_rows(), "some rows could not be parsed");
        }
        info!(rows = self.transactions.len(), "loaded transactions");
        self
    }
}

/// Reader settings shared by every input source.
pub fn reader_builder(delimiter: u8) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true);
    builder
}

pub fn load_from_reader<R: Read>(input: R, delimiter: u8) -> Result<LoadedTable, Error> {
    load(reader_builder(delimiter).from_reader(input))
}

/// Loads a file, reading spreadsheets (by extension) through
/// [`workbook::load_workbook`] and everything else as delimited text.
/// `delimiter` only applies to delimited text.
pub fn load_from_path(path: impl AsRef<Path>, delimiter: u8) -> Result<LoadedTable, Error> {
    let path = path.as_ref();
    if workbook::is_workbook(path) {
        return workbook::load_workbook(path);
    }
    let file = File::open(path)
        .map_err(|e| Error::ReadFailure(format!("{}: {}", path.display(), e)))?;
    load_from_reader(file, delimiter)
}

/// Loads the whole input into memory.
///
/// Fails only when the header lacks a required column or the underlying
/// reader errors. Rows that fail coercion are skipped and reported in
/// [`LoadedTable::warnings`].
pub fn load<R: Read>(mut rdr: csv::Reader<R>) -> Result<LoadedTable, Error> {
    let columns = ColumnMap::resolve(rdr.headers()?)?;
    let mut table = LoadedTable::default();

    for (index, record) in rdr.records().enumerate() {
        let fallback_line = index as u64 + 2;
        let parsed = match record {
            Ok(record) => {
                let line = record.position().map_or(fallback_line, |p| p.line());
                parse_row(&record, &columns).map_err(|reason| RowParseWarning { line, reason })
            }
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => Err(RowParseWarning {
                line: e.position().map_or(fallback_line, |p| p.line()),
                reason: RowError::Malformed(e.to_string()),
            }),
        };
        table.push(parsed);
    }

    Ok(table.finish())
}

pub(crate) fn parse_row(record: &csv::StringRecord, columns: &ColumnMap) -> Result<Transaction, RowError> {
    let raw_timestamp = columns.required(record, Column::Timestamp)?;
    let timestamp = parse_timestamp(raw_timestamp, columns.cell(record, Column::Time))
        .ok_or_else(|| RowError::InvalidTimestamp(raw_timestamp.to_string()))?;

    let raw_amount = columns.required(record, Column::Amount)?;
    let amount =
        parse_decimal(raw_amount).ok_or_else(|| RowError::InvalidAmount(raw_amount.to_string()))?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(RowError::NegativeAmount(raw_amount.to_string()));
    }
    if amount > MAX_AMOUNT {
        return Err(RowError::AmountOutOfRange(raw_amount.to_string()));
    }

    let owned = |column| columns.cell(record, column).map(str::to_string);

    Ok(Transaction {
        timestamp,
        amount,
        payment_method: columns.required(record, Column::PaymentMethod)?.to_string(),
        transaction_type: columns.required(record, Column::TransactionType)?.to_string(),
        status: columns.required(record, Column::Status)?.to_string(),
        city: owned(Column::City),
        merchant: owned(Column::Merchant),
        bank: owned(Column::Bank),
        remaining_balance: columns
            .cell(record, Column::RemainingBalance)
            .and_then(parse_decimal),
        customer_age: columns.cell(record, Column::CustomerAge).and_then(parse_age),
    })
}

/// Parses a date or date-time cell. A parseable `time` cell supplies the
/// time of day.
pub fn parse_timestamp(date: &str, time: Option<&str>) -> Option<NaiveDateTime> {
    let time = time.and_then(parse_time);

    let parsed = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(date, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(date, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })?;

    Some(match time {
        Some(time) => parsed.date().and_time(time),
        None => parsed,
    })
}

fn parse_time(time: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(time, fmt).ok())
}

/// Accepts plain and scientific notation, with an optional rupee sign and
/// thousands separators.
fn parse_decimal(value: &str) -> Option<Decimal> {
    let cleaned: String = value
        .chars()
        .filter(|c| *c != ',' && *c != '₹' && !c.is_whitespace())
        .collect();
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

fn parse_age(value: &str) -> Option<u32> {
    value.parse().ok().or_else(|| {
        parse_decimal(value)
            .filter(|d| d.fract().is_zero())
            .and_then(|d| d.to_u32())
    })
}
