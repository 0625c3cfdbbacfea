use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use upi_insights::{
    aggregate::{monthly_trend, top_merchants, AggregateView, DEFAULT_TOP_N},
    export, filter, loader, FilterCriteria, Session, Transaction,
};

const DATASET: &str = r#"TransactionID, TransactionDate, TransactionTime, Amount, PaymentMethod, TransactionType, Status, City, MerchantName, BankNameSent
T1, 2024-01-05, 10:15:00, 100.00, UPI-A, P2M, success, Pune, Merchant1, SBI
T2, 2024-02-10, 18:30:00, 50.00, UPI-B, P2P, failed, Mumbai, , HDFC
T3, 2024-02-14, 21:05:00, 1200.50, UPI-A, P2M, success, Mumbai,"Cafe, Bakery", SBI
T4, 2024-02-30, 09:00:00, 10.00, UPI-C, P2P, success, Pune, , ICICI
T5, 2024-03-01, 07:45:00, 75.25, UPI-C, P2M, pending, , Merchant1, SBI
T6, 2024-03-09, 23:59:00, -3.00, UPI-A, P2P, success, Delhi, , HDFC
T7, 2024-03-15, 13:00:00, 310.00, UPI-B, BillPay, success, Delhi, Power Co, AXIS
"#;

fn session() -> Session {
    Session::load_from_reader(DATASET.as_bytes(), b',').unwrap()
}

fn process_and_dump(input: &str, criteria: &FilterCriteria) -> String {
    let table = loader::load_from_reader(input.as_bytes(), b',').unwrap();
    let rows = filter::apply(&table.transactions, criteria);
    String::from_utf8(export::to_bytes(&rows).unwrap()).unwrap()
}

fn total(rows: &[&Transaction]) -> Decimal {
    rows.iter().map(|t| t.amount).sum()
}

#[test]
fn loads_and_counts_skipped_rows() {
    let session = session();
    // T4 has no 30th of February, T6 is negative
    assert_eq!(session.transactions().len(), 5);
    assert_eq!(session.table().skipped_rows(), 2);
    assert_eq!(session.transactions()[2].merchant.as_deref(), Some("Cafe, Bakery"));
    assert_eq!(session.transactions()[0].bank.as_deref(), Some("SBI"));
}

#[test]
fn example_scenario() {
    let input = "timestamp,amount,payment_method,transaction_type,status,city,merchant\n\
                 2024-01-05,100.00,UPI-A,P2M,success,Pune,Merchant1\n\
                 2024-02-10,50.00,UPI-B,P2P,failed,Mumbai,";
    let session = Session::load_from_reader(input.as_bytes(), b',').unwrap();
    let rows = session
        .filter(&FilterCriteria::new().with_status("success"))
        .unwrap();

    assert_eq!(rows, vec![&session.transactions()[0]]);
    let trend = monthly_trend(&rows);
    assert_eq!(trend.len(), 1);
    assert_eq!(trend[0].month.to_string(), "2024-01");
    assert_eq!(trend[0].total, dec!(100.00));
    let top = top_merchants(&rows, DEFAULT_TOP_N);
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].merchant, "Merchant1");
    assert_eq!(top[0].total, dec!(100.00));
}

#[test]
fn filtered_rows_are_an_ordered_subsequence() {
    let session = session();
    let criterias = [
        FilterCriteria::new(),
        FilterCriteria::new().with_city("Mumbai"),
        FilterCriteria::new().with_payment_method("UPI-A").with_status("success"),
        FilterCriteria::new().amount_range(Some(dec!(60)), None),
    ];
    for criteria in &criterias {
        let rows = session.filter(criteria).unwrap();
        assert_eq!(rows, session.filter(criteria).unwrap());

        let mut source = session.transactions().iter();
        for row in &rows {
            assert!(source.any(|t| std::ptr::eq(t, *row)), "{:?} out of order", row);
        }
    }
}

#[test]
fn monthly_trend_sums_to_selection_total() {
    let session = session();
    for criteria in [
        FilterCriteria::new(),
        FilterCriteria::new().with_status("success"),
        FilterCriteria::new().with_city("Mumbai").with_city("Delhi"),
    ] {
        let rows = session.filter(&criteria).unwrap();
        let view = AggregateView::compute(&rows, DEFAULT_TOP_N);
        let trend_total: Decimal = view.monthly_trend.iter().map(|m| m.total).sum();
        assert_eq!(trend_total, total(&rows));
        assert_eq!(view.summary.total, total(&rows));
        assert_eq!(view.activity.total(), rows.len() as u64);
    }
}

#[test]
fn full_view_over_dataset() {
    let session = session();
    let rows = session.filter(&FilterCriteria::new()).unwrap();
    let view = AggregateView::compute(&rows, 2);

    let merchants: Vec<(&str, Decimal)> = view
        .top_merchants
        .iter()
        .map(|m| (m.merchant.as_str(), m.total))
        .collect();
    assert_eq!(merchants, vec![("Cafe, Bakery", dec!(1200.50)), ("Power Co", dec!(310.00))]);

    let methods: Vec<(&str, u64)> = view
        .by_payment_method
        .iter()
        .map(|g| (g.key.as_str(), g.count))
        .collect();
    assert_eq!(methods, vec![("UPI-A", 2), ("UPI-B", 2), ("UPI-C", 1)]);

    // the time column drives the hour; 2024-02-14 is a Wednesday
    assert_eq!(view.activity.count(21, 2), Some(1));
}

#[test]
fn empty_selection_exports_header_only() {
    assert_eq!(
        process_and_dump(DATASET, &FilterCriteria::new().with_city("Chennai")),
        "timestamp,amount,payment_method,transaction_type,status,city,merchant,bank,remaining_balance,customer_age\n"
    );
}

#[test]
fn export_of_selection() {
    assert_eq!(
        process_and_dump(DATASET, &FilterCriteria::new().with_city("Mumbai")),
        [
            "timestamp,amount,payment_method,transaction_type,status,city,merchant,bank,remaining_balance,customer_age",
            "2024-02-10 18:30:00,50.00,UPI-B,P2P,failed,Mumbai,,HDFC,,",
            "2024-02-14 21:05:00,1200.50,UPI-A,P2M,success,Mumbai,\"Cafe, Bakery\",SBI,,",
            "",
        ]
        .join("\n")
    );
}

#[test]
fn export_then_reload_round_trips() {
    let session = session();
    let criteria = FilterCriteria::new().with_status("success").with_status("pending");
    let rows = session.filter(&criteria).unwrap();

    let exported = export::to_bytes(&rows).unwrap();
    let reloaded = Session::load_from_reader(exported.as_slice(), b',').unwrap();

    assert_eq!(reloaded.table().skipped_rows(), 0);
    let originals: Vec<Transaction> = rows.into_iter().cloned().collect();
    assert_eq!(reloaded.transactions(), originals.as_slice());
}

#[test]
fn loads_first_worksheet_of_xlsx() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/transactions.xlsx");
    let session = Session::load_from_path(path, b',').unwrap();

    assert_eq!(session.table().skipped_rows(), 1);
    assert_eq!(session.table().warnings[0].line, 4);

    let rows = session.transactions();
    assert_eq!(rows.len(), 3);

    assert_eq!(rows[0].date().to_string(), "2024-01-05");
    assert_eq!(rows[0].hour(), 10);
    assert_eq!(rows[0].amount, dec!(100));
    assert_eq!(rows[0].merchant.as_deref(), Some("Merchant1"));

    assert_eq!(rows[1].hour(), 18);
    assert_eq!(rows[1].amount, dec!(50.5));
    assert_eq!(rows[1].merchant, None);

    assert_eq!(rows[2].date().to_string(), "2024-02-14");
    assert_eq!(rows[2].hour(), 21);
    assert_eq!(rows[2].merchant.as_deref(), Some("Cafe, Bakery"));

    let view = AggregateView::compute(&session.filter(&FilterCriteria::new()).unwrap(), DEFAULT_TOP_N);
    assert_eq!(view.summary.total, dec!(1350.5));
}
