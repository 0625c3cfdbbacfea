use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

/// One row of the loaded table.
///
/// Records are never mutated after loading; filters and aggregations only
/// borrow them.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub timestamp: NaiveDateTime,
    pub amount: Decimal,
    pub payment_method: String,
    pub transaction_type: String,
    pub status: String,
    pub city: Option<String>,
    /// Absent for peer-to-peer transfers.
    pub merchant: Option<String>,
    pub bank: Option<String>,
    pub remaining_balance: Option<Decimal>,
    pub customer_age: Option<u32>,
}

impl Transaction {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn month(&self) -> Month {
        Month {
            year: self.timestamp.year(),
            month: self.timestamp.month(),
        }
    }

    /// Hour of day, 0..=23.
    pub fn hour(&self) -> usize {
        self.timestamp.hour() as usize
    }

    /// Day of week with Monday = 0 .. Sunday = 6.
    pub fn weekday(&self) -> usize {
        self.timestamp.weekday().num_days_from_monday() as usize
    }
}

/// Calendar month key. Orders chronologically and renders as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for Month {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}
