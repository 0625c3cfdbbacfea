use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{error::Error, transaction::Transaction};

/// Conjunction of predicates rebuilt from the current widget state.
///
/// Unset bounds and empty sets place no restriction. Date bounds compare the
/// calendar date of the timestamp and are inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub cities: BTreeSet<String>,
    pub payment_methods: BTreeSet<String>,
    pub statuses: BTreeSet<String>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
}

impl FilterCriteria {
    /// Criteria matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    #[must_use]
    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.cities.insert(city.into());
        self
    }

    #[must_use]
    pub fn with_payment_method(mut self, method: impl Into<String>) -> Self {
        self.payment_methods.insert(method.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.statuses.insert(status.into());
        self
    }

    #[must_use]
    pub fn amount_range(mut self, min: Option<Decimal>, max: Option<Decimal>) -> Self {
        self.amount_min = min;
        self.amount_max = max;
        self
    }

    /// Rejects inverted ranges, which could never match anything.
    pub fn validate(&self) -> Result<(), Error> {
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(Error::InvalidCriteria(format!(
                    "date range starts ({}) after it ends ({})",
                    from, to
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.amount_min, self.amount_max) {
            if min > max {
                return Err(Error::InvalidCriteria(format!(
                    "minimum amount {} exceeds maximum {}",
                    min, max
                )));
            }
        }
        Ok(())
    }

    pub fn matches(&self, transaction: &Transaction) -> bool {
        let date = transaction.date();
        self.date_from.map_or(true, |from| from <= date)
            && self.date_to.map_or(true, |to| date <= to)
            && allows(&self.cities, transaction.city.as_deref())
            && allows(&self.payment_methods, Some(transaction.payment_method.as_str()))
            && allows(&self.statuses, Some(transaction.status.as_str()))
            && self.amount_min.map_or(true, |min| min <= transaction.amount)
            && self.amount_max.map_or(true, |max| transaction.amount <= max)
    }
}

/// An empty set allows anything, including a missing value.
fn allows(set: &BTreeSet<String>, value: Option<&str>) -> bool {
    set.is_empty() || value.map_or(false, |v| set.contains(v))
}

/// Stable filter: the result keeps input order and borrows from `records`.
pub fn apply<'a>(records: &'a [Transaction], criteria: &FilterCriteria) -> Vec<&'a Transaction> {
    records.iter().filter(|t| criteria.matches(t)).collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use crate::error::Error;
    use crate::filter::{apply, FilterCriteria};
    use crate::transaction::{fixtures::tx, Transaction};

    fn table() -> Vec<Transaction> {
        vec![
            tx("2024-01-05 10:00:00", dec!(100.00), "UPI-A", "success", Some("Pune"), Some("Merchant1")),
            tx("2024-02-10 18:30:00", dec!(50.00), "UPI-B", "failed", Some("Mumbai"), None),
            tx("2024-02-29 23:59:59", dec!(75.25), "UPI-A", "pending", None, Some("Merchant2")),
            tx("2024-03-01 00:00:00", dec!(10.00), "UPI-C", "success", Some("Pune"), None),
        ]
    }

    fn date(s: &str) -> Option<NaiveDate> {
        Some(NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap())
    }

    fn amounts(filtered: &[&Transaction]) -> Vec<rust_decimal::Decimal> {
        filtered.iter().map(|t| t.amount).collect()
    }

    #[test]
    fn empty_criteria_keep_everything() {
        let records = table();
        assert_eq!(apply(&records, &FilterCriteria::new()).len(), records.len());
    }

    #[test]
    fn status_filter_from_example() {
        let records = table();
        let filtered = apply(&records, &FilterCriteria::new().with_status("success"));
        assert_eq!(amounts(&filtered), vec![dec!(100.00), dec!(10.00)]);
    }

    #[test]
    fn date_bounds_are_inclusive_whole_days() {
        let records = table();
        let criteria = FilterCriteria::new().between(date("2024-02-10"), date("2024-02-29"));
        assert_eq!(amounts(&apply(&records, &criteria)), vec![dec!(50.00), dec!(75.25)]);

        let criteria = FilterCriteria::new().between(date("2024-03-01"), None);
        assert_eq!(amounts(&apply(&records, &criteria)), vec![dec!(10.00)]);
    }

    #[test]
    fn city_filter_excludes_records_without_city() {
        let records = table();
        let criteria = FilterCriteria::new().with_city("Pune").with_city("Mumbai");
        assert_eq!(
            amounts(&apply(&records, &criteria)),
            vec![dec!(100.00), dec!(50.00), dec!(10.00)]
        );
    }

    #[test]
    fn amount_bounds_are_inclusive() {
        let records = table();
        let criteria = FilterCriteria::new().amount_range(Some(dec!(50.00)), Some(dec!(75.25)));
        assert_eq!(amounts(&apply(&records, &criteria)), vec![dec!(50.00), dec!(75.25)]);
    }

    #[test]
    fn predicates_are_conjunctive() {
        let records = table();
        let criteria = FilterCriteria::new()
            .with_payment_method("UPI-A")
            .with_status("pending")
            .amount_range(None, Some(dec!(80)));
        assert_eq!(amounts(&apply(&records, &criteria)), vec![dec!(75.25)]);
    }

    #[test]
    fn categorical_matching_is_exact() {
        let records = table();
        assert!(apply(&records, &FilterCriteria::new().with_status("SUCCESS")).is_empty());
    }

    #[test]
    fn filtering_is_idempotent_and_order_preserving() {
        let records = table();
        let criteria = FilterCriteria::new().with_payment_method("UPI-A").with_payment_method("UPI-C");
        let first = apply(&records, &criteria);
        let second = apply(&records, &criteria);
        assert_eq!(first, second);

        // every output record appears in the source, in the same relative order
        let positions: Vec<usize> = first
            .iter()
            .map(|f| records.iter().position(|r| std::ptr::eq(r, *f)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn rejects_inverted_ranges() {
        let criteria = FilterCriteria::new().between(date("2024-02-01"), date("2024-01-01"));
        assert!(matches!(criteria.validate(), Err(Error::InvalidCriteria(_))));

        let criteria = FilterCriteria::new().amount_range(Some(dec!(10)), Some(dec!(1)));
        assert!(matches!(criteria.validate(), Err(Error::InvalidCriteria(_))));

        assert_eq!(FilterCriteria::new().validate(), Ok(()));
    }
}
