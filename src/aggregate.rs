//! Derived, read-only views over a filtered set of transactions.
//!
//! Every function here accepts an empty slice and returns an empty view.

use std::{collections::BTreeMap, str::FromStr};

use itertools::Itertools;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::Serialize;

use crate::transaction::{Month, Transaction};

pub const DEFAULT_TOP_N: usize = 10;

pub const HOURS: usize = 24;
pub const WEEKDAYS: usize = 7;

/// Column labels of [`ActivityMatrix`], Monday first.
pub const WEEKDAY_LABELS: [&str; WEEKDAYS] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTotal<K> {
    pub key: K,
    pub count: u64,
    pub total: Decimal,
}

/// Groups by `key`, skipping records for which it returns `None`.
///
/// Sorted by total descending, ties broken by key ascending.
pub fn group_by<'a, K, F>(records: &[&'a Transaction], key: F) -> Vec<GroupTotal<K>>
where
    K: Ord,
    F: Fn(&'a Transaction) -> Option<K>,
{
    let mut groups: BTreeMap<K, (u64, Decimal)> = BTreeMap::new();
    for &record in records {
        if let Some(k) = key(record) {
            let entry = groups.entry(k).or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 += record.amount;
        }
    }

    groups
        .into_iter()
        .map(|(key, (count, total))| GroupTotal { key, count, total })
        .sorted_by(|a, b| b.total.cmp(&a.total).then_with(|| a.key.cmp(&b.key)))
        .collect()
}

/// Categorical columns a breakdown can group on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    PaymentMethod,
    TransactionType,
    Status,
    City,
    Bank,
}

impl Dimension {
    pub fn key(self, transaction: &Transaction) -> Option<&str> {
        match self {
            Dimension::PaymentMethod => Some(transaction.payment_method.as_str()),
            Dimension::TransactionType => Some(transaction.transaction_type.as_str()),
            Dimension::Status => Some(transaction.status.as_str()),
            Dimension::City => transaction.city.as_deref(),
            Dimension::Bank => transaction.bank.as_deref(),
        }
    }
}

pub fn breakdown(records: &[&Transaction], dimension: Dimension) -> Vec<GroupTotal<String>> {
    group_by(records, |t| dimension.key(t))
        .into_iter()
        .map(|g| GroupTotal {
            key: g.key.to_string(),
            count: g.count,
            total: g.total,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotal {
    pub month: Month,
    pub total: Decimal,
}

/// Sum of amounts per calendar month, oldest first.
pub fn monthly_trend(records: &[&Transaction]) -> Vec<MonthlyTotal> {
    let mut months: BTreeMap<Month, Decimal> = BTreeMap::new();
    for record in records {
        *months.entry(record.month()).or_insert(Decimal::ZERO) += record.amount;
    }
    months
        .into_iter()
        .map(|(month, total)| MonthlyTotal { month, total })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantTotal {
    pub merchant: String,
    pub total: Decimal,
}

/// The `n` merchants with the highest total. Records without a merchant are
/// ignored.
pub fn top_merchants(records: &[&Transaction], n: usize) -> Vec<MerchantTotal> {
    group_by(records, |t| t.merchant.as_deref())
        .into_iter()
        .take(n)
        .map(|g| MerchantTotal {
            merchant: g.key.to_string(),
            total: g.total,
        })
        .collect()
}

/// Transaction counts indexed by `[hour][weekday]`: hour 0..=23, weekday
/// Monday = 0 through Sunday = 6 (see [`WEEKDAY_LABELS`]).
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityMatrix {
    counts: [[u64; WEEKDAYS]; HOURS],
}

impl ActivityMatrix {
    /// `None` outside hour 0..=23 or weekday 0..=6.
    pub fn count(&self, hour: usize, weekday: usize) -> Option<u64> {
        self.counts.get(hour)?.get(weekday).copied()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

pub fn activity_matrix(records: &[&Transaction]) -> ActivityMatrix {
    let mut matrix = ActivityMatrix::default();
    for record in records {
        matrix.counts[record.hour()][record.weekday()] += 1;
    }
    matrix
}

/// Headline figures. Mean and median are absent for an empty selection.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: u64,
    pub total: Decimal,
    pub mean: Option<Decimal>,
    pub median: Option<Decimal>,
}

pub fn summary(records: &[&Transaction]) -> Summary {
    if records.is_empty() {
        return Summary::default();
    }
    let count = records.len() as u64;
    let total: Decimal = records.iter().map(|t| t.amount).sum();
    let sorted: Vec<Decimal> = records.iter().map(|t| t.amount).sorted().collect();
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / Decimal::TWO
    };

    Summary {
        count,
        total,
        mean: Some(total / Decimal::from(count)),
        median: Some(median),
    }
}

/// Numeric columns that can be plotted against the amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScatterAxis {
    RemainingBalance,
    CustomerAge,
}

impl ScatterAxis {
    fn value(self, transaction: &Transaction) -> Option<Decimal> {
        match self {
            ScatterAxis::RemainingBalance => transaction.remaining_balance,
            ScatterAxis::CustomerAge => transaction.customer_age.map(Decimal::from),
        }
    }
}

impl FromStr for ScatterAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remaining-balance" => Ok(ScatterAxis::RemainingBalance),
            "customer-age" => Ok(ScatterAxis::CustomerAge),
            other => Err(format!(
                "unknown scatter axis `{}`, expected `remaining-balance` or `customer-age`",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub x: Decimal,
    pub amount: Decimal,
}

pub fn scatter(records: &[&Transaction], axis: ScatterAxis) -> Vec<ScatterPoint> {
    records
        .iter()
        .filter_map(|t| {
            axis.value(t).map(|x| ScatterPoint {
                x,
                amount: t.amount,
            })
        })
        .collect()
}

/// Ordinary least squares fit `amount = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trendline {
    pub slope: f64,
    pub intercept: f64,
}

/// `None` with fewer than two points or when every `x` is the same.
pub fn trendline(points: &[ScatterPoint]) -> Option<Trendline> {
    let xy: Vec<(f64, f64)> = points
        .iter()
        .filter_map(|p| Some((p.x.to_f64()?, p.amount.to_f64()?)))
        .collect();
    if xy.len() < 2 {
        return None;
    }

    let n = xy.len() as f64;
    let mean_x = xy.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = xy.iter().map(|(_, y)| y).sum::<f64>() / n;
    let (sxx, sxy) = xy.iter().fold((0.0, 0.0), |(sxx, sxy), (x, y)| {
        let dx = x - mean_x;
        (sxx + dx * dx, sxy + dx * (y - mean_y))
    });
    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    Some(Trendline {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

/// Everything the dashboard charts need for one filtered selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateView {
    pub summary: Summary,
    pub monthly_trend: Vec<MonthlyTotal>,
    pub by_payment_method: Vec<GroupTotal<String>>,
    pub by_transaction_type: Vec<GroupTotal<String>>,
    pub top_merchants: Vec<MerchantTotal>,
    pub activity: ActivityMatrix,
}

impl AggregateView {
    pub fn compute(records: &[&Transaction], top_n: usize) -> Self {
        AggregateView {
            summary: summary(records),
            monthly_trend: monthly_trend(records),
            by_payment_method: breakdown(records, Dimension::PaymentMethod),
            by_transaction_type: breakdown(records, Dimension::TransactionType),
            top_merchants: top_merchants(records, top_n),
            activity: activity_matrix(records),
        }
    }
}
