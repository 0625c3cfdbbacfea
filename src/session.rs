use std::{io::Read, path::Path};

use chrono::NaiveDate;
use itertools::{Itertools, MinMaxResult};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    aggregate::{scatter, trendline, AggregateView, ScatterAxis, ScatterPoint, Trendline, DEFAULT_TOP_N},
    error::Error,
    filter::{self, FilterCriteria},
    loader::{self, LoadedTable},
    transaction::Transaction,
};

/// Values available to the filter widgets, derived from the loaded table.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    /// Sorted, distinct.
    pub cities: Vec<String>,
    /// Sorted, distinct.
    pub payment_methods: Vec<String>,
    /// Distinct, in order of first appearance.
    pub statuses: Vec<String>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub amount_range: Option<(Decimal, Decimal)>,
}

fn bounds<T: PartialOrd + Copy>(values: impl Iterator<Item = T>) -> Option<(T, T)> {
    match values.minmax() {
        MinMaxResult::NoElements => None,
        MinMaxResult::OneElement(v) => Some((v, v)),
        MinMaxResult::MinMax(min, max) => Some((min, max)),
    }
}

impl FilterOptions {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        FilterOptions {
            cities: transactions
                .iter()
                .filter_map(|t| t.city.clone())
                .sorted()
                .dedup()
                .collect(),
            payment_methods: transactions
                .iter()
                .map(|t| t.payment_method.clone())
                .sorted()
                .dedup()
                .collect(),
            statuses: transactions
                .iter()
                .map(|t| t.status.clone())
                .unique()
                .collect(),
            date_range: bounds(transactions.iter().map(Transaction::date)),
            amount_range: bounds(transactions.iter().map(|t| t.amount)),
        }
    }

    /// Criteria spanning the full extent of the data. Categorical sets stay
    /// empty so records without a city are kept.
    pub fn unrestricted(&self) -> FilterCriteria {
        FilterCriteria::new()
            .between(
                self.date_range.map(|(from, _)| from),
                self.date_range.map(|(_, to)| to),
            )
            .amount_range(
                self.amount_range.map(|(min, _)| min),
                self.amount_range.map(|(_, max)| max),
            )
    }
}

/// Settings for a report pass that are not filters.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOptions {
    pub top_n: usize,
    pub scatter: Option<ScatterAxis>,
    pub trendline: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            top_n: DEFAULT_TOP_N,
            scatter: None,
            trendline: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterView {
    pub axis: ScatterAxis,
    pub points: Vec<ScatterPoint>,
    pub trendline: Option<Trendline>,
}

/// The outcome of one interaction: the matching rows and everything derived
/// from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report<'a> {
    #[serde(skip_serializing)]
    pub rows: Vec<&'a Transaction>,
    pub matched: usize,
    pub skipped_rows: usize,
    pub view: AggregateView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scatter: Option<ScatterView>,
}

/// Owns the loaded table for the lifetime of a user session. Every pass
/// borrows it immutably.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Session {
    table: LoadedTable,
}

impl Session {
    pub fn new(table: LoadedTable) -> Self {
        Session { table }
    }

    pub fn load_from_reader<R: Read>(input: R, delimiter: u8) -> Result<Self, Error> {
        loader::load_from_reader(input, delimiter).map(Session::new)
    }

    pub fn load_from_path(path: impl AsRef<Path>, delimiter: u8) -> Result<Self, Error> {
        loader::load_from_path(path, delimiter).map(Session::new)
    }

    pub fn table(&self) -> &LoadedTable {
        &self.table
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.table.transactions
    }

    pub fn options(&self) -> FilterOptions {
        FilterOptions::from_transactions(self.transactions())
    }

    /// Validates `criteria` and returns the matching rows in table order.
    pub fn filter(&self, criteria: &FilterCriteria) -> Result<Vec<&Transaction>, Error> {
        criteria.validate()?;
        let rows = filter::apply(self.transactions(), criteria);
        if rows.is_empty() {
            warn!("no transactions match the current filters");
        } else {
            info!(matched = rows.len(), of = self.transactions().len(), "filtered transactions");
        }
        Ok(rows)
    }

    /// One full recomputation: filter, then aggregate.
    pub fn run(&self, criteria: &FilterCriteria, options: &ReportOptions) -> Result<Report<'_>, Error> {
        let rows = self.filter(criteria)?;
        let view = AggregateView::compute(&rows, options.top_n);
        let scatter_view = options.scatter.map(|axis| {
            let points = scatter(&rows, axis);
            let fitted = if options.trendline { trendline(&points) } else { None };
            ScatterView {
                axis,
                points,
                trendline: fitted,
            }
        });

        Ok(Report {
            matched: rows.len(),
            skipped_rows: self.table.skipped_rows(),
            rows,
            view,
            scatter: scatter_view,
        })
    }
}
