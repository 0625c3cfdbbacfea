use std::io::Write;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::{error::Error, loader::Column, transaction::Transaction};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const EXPORT_COLUMNS: [Column; 10] = [
    Column::Timestamp,
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

/// Field order must follow `EXPORT_COLUMNS`.
#[derive(Serialize)]
struct ExportRow<'a> {
    timestamp: String,
    amount: Decimal,
    payment_method: &'a str,
    transaction_type: &'a str,
    status: &'a str,
    city: Option<&'a str>,
    merchant: Option<&'a str>,
    bank: Option<&'a str>,
    remaining_balance: Option<Decimal>,
    customer_age: Option<u32>,
}

impl<'a> From<&'a Transaction> for ExportRow<'a> {
    fn from(t: &'a Transaction) -> Self {
        ExportRow {
            timestamp: t.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            amount: t.amount,
            payment_method: &t.payment_method,
            transaction_type: &t.transaction_type,
            status: &t.status,
            city: t.city.as_deref(),
            merchant: t.merchant.as_deref(),
            bank: t.bank.as_deref(),
            remaining_balance: t.remaining_balance,
            customer_age: t.customer_age,
        }
    }
}

/// Writes `records` as CSV: a header row with the canonical column names,
/// then one line per record in input order. An empty selection yields the
/// header alone. Output reloads through the loader unchanged.
pub fn export(records: &[&Transaction], output: impl Write) -> Result<(), Error> {
    let failure = |e: csv::Error| Error::WriteFailure(e.to_string());

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(output);
    writer
        .write_record(EXPORT_COLUMNS.iter().map(|c| c.name()))
        .map_err(failure)?;
    for &record in records {
        writer.serialize(ExportRow::from(record)).map_err(failure)?;
    }
    writer
        .flush()
        .map_err(|e| Error::WriteFailure(e.to_string()))?;
    Ok(())
}

pub fn to_bytes(records: &[&Transaction]) -> Result<Vec<u8>, Error> {
    let mut output = Vec::new();
    export(records, &mut output)?;
    Ok(output)
}
