//! Integration tests for mony-core
//!
//! These tests exercise the full upload → extract → normalize → persist → query workflow
//! against a scripted model backend.

use std::sync::Arc;

use chrono::NaiveDate;
use mony_core::{
    ai::{AIClient, MockBackend, MockReply, ReceiptExtractor},
    db::{Database, ListParams},
    Config, Error, NewTransaction, ReceiptItem, ReceiptPipeline, TransactionType,
};
use rust_decimal::Decimal;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn pipeline_with(mock: &MockBackend) -> (ReceiptPipeline, Database) {
    let config = Arc::new(Config::default());
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let extractor = ReceiptExtractor::new(AIClient::Mock(mock.clone()), config.clone())
        .expect("Failed to load receipt prompt");
    (ReceiptPipeline::new(db.clone(), config, Some(extractor)), db)
}

fn expense(merchant: &str, amount: &str, category: Option<&str>) -> NewTransaction {
    NewTransaction {
        transaction_type: TransactionType::Expense,
        merchant: merchant.to_string(),
        date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
        amount: dec(amount),
        currency: "USD".to_string(),
        payment_method: None,
        category: category.map(str::to_string),
        description: None,
        reference_number: None,
        taxes: None,
        items: vec![],
    }
}

// =============================================================================
// Receipt Pipeline
// =============================================================================

#[tokio::test]
async fn test_upload_checks_run_before_model() {
    let mock = MockBackend::new();
    let (pipeline, _db) = pipeline_with(&mock);

    let err = pipeline.extract(b"%PDF-1.4", "application/pdf").await.unwrap_err();
    assert_eq!(err.kind(), "UnsupportedMediaType");

    let oversized = vec![0u8; Config::default().max_upload_bytes + 1];
    let err = pipeline.extract(&oversized, "image/jpeg").await.unwrap_err();
    assert_eq!(err.kind(), "PayloadTooLarge");

    assert_eq!(mock.calls(), 0, "model must not be called for rejected uploads");

    pipeline.extract(b"jpeg", "image/jpeg").await.unwrap();
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn test_missing_total_defaults_with_warning() {
    let mock = MockBackend::with_text(
        r#"{"merchant": "Kiosk", "date": "2024-02-02", "currency": "USD", "items": []}"#,
    );
    let (pipeline, _db) = pipeline_with(&mock);

    let outcome = pipeline.extract(b"img", "image/png").await.unwrap();
    assert_eq!(outcome.receipt.total_amount, Decimal::ZERO);
    assert!(outcome.warnings.iter().any(|w| w.field == "total_amount"));
}

#[tokio::test]
async fn test_item_total_derived() {
    let mock = MockBackend::with_text(
        r#"{"merchant": "Bakery", "total_amount": "7.50", "currency": "USD",
            "items": [{"name": "Roll", "quantity": 3, "unit_price": 2.50}]}"#,
    );
    let (pipeline, _db) = pipeline_with(&mock);

    let outcome = pipeline.extract(b"img", "image/png").await.unwrap();
    assert_eq!(outcome.receipt.items[0].total_price, dec("7.50"));
}

#[tokio::test]
async fn test_fenced_reply_with_prose() {
    let mock = MockBackend::with_text(
        "```json\n{\"merchant\": \"Deli\", \"total_amount\": 12.40, \"currency\": \"EUR\"}\n```\nLet me know if you need anything else {or more}.",
    );
    let (pipeline, _db) = pipeline_with(&mock);

    let outcome = pipeline.extract(b"img", "image/png").await.unwrap();
    assert_eq!(outcome.receipt.merchant, "Deli");
    assert_eq!(outcome.receipt.total_amount, dec("12.40"));
    assert_eq!(outcome.receipt.currency, "EUR");
}

#[tokio::test]
async fn test_extraction_failure_persists_nothing() {
    let mock = MockBackend::with_replies([MockReply::Text("no json here".into())]);
    let (pipeline, db) = pipeline_with(&mock);

    let err = pipeline
        .submit(b"img", "image/png", TransactionType::Expense)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExtractionParse { .. }));

    let page = db
        .list_transactions(&Default::default(), Default::default(), mony_core::Page::new(None, None, 100).unwrap())
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_same_image_twice_creates_two_rows() {
    let mock = MockBackend::new();
    let (pipeline, db) = pipeline_with(&mock);

    let first = pipeline
        .submit(b"same-bytes", "image/jpeg", TransactionType::Expense)
        .await
        .unwrap();
    let second = pipeline
        .submit(b"same-bytes", "image/jpeg", TransactionType::Expense)
        .await
        .unwrap();

    assert_ne!(first.transaction.id, second.transaction.id);
    assert_eq!(first.transaction.amount, second.transaction.amount);
    let page = db
        .list_transactions(&Default::default(), Default::default(), mony_core::Page::new(None, None, 100).unwrap())
        .unwrap();
    assert_eq!(page.total, 2);
}

// =============================================================================
// Query Engine
// =============================================================================

#[test]
fn test_roundtrip_through_store() {
    let db = Database::in_memory().unwrap();
    let config = Config::default();

    let submitted = NewTransaction {
        transaction_type: TransactionType::Income,
        merchant: "  Corner Market ".to_string(),
        date: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        amount: dec("25.50"),
        currency: "eur".to_string(),
        payment_method: Some("card".to_string()),
        category: Some("groceries".to_string()),
        description: Some("weekly shop".to_string()),
        reference_number: Some("R-0042".to_string()),
        taxes: Some(dec("2.04")),
        items: vec![
            ReceiptItem {
                name: "Oat milk".to_string(),
                quantity: dec("2"),
                unit_price: dec("1.75"),
                total_price: dec("3.50"),
            },
            ReceiptItem {
                name: "Bread".to_string(),
                quantity: dec("1"),
                unit_price: dec("22.00"),
                total_price: dec("22.00"),
            },
        ],
    }
    .prepare(&config)
    .unwrap();
    assert_eq!(submitted.merchant, "Corner Market");
    assert_eq!(submitted.currency, "EUR");

    let stored = db.insert_transaction(&submitted).unwrap();
    let fetched = db.get_transaction(stored.id).unwrap().unwrap();

    assert_eq!(fetched.id, stored.id);
    assert_eq!(fetched.transaction_type, submitted.transaction_type);
    assert_eq!(fetched.merchant, submitted.merchant);
    assert_eq!(fetched.date, submitted.date);
    assert_eq!(fetched.amount, submitted.amount);
    assert_eq!(fetched.currency, submitted.currency);
    assert_eq!(fetched.payment_method, submitted.payment_method);
    assert_eq!(fetched.category, submitted.category);
    assert_eq!(fetched.description, submitted.description);
    assert_eq!(fetched.reference_number, submitted.reference_number);
    assert_eq!(fetched.taxes, submitted.taxes);
    assert_eq!(fetched.items, submitted.items);
}

#[test]
fn test_monthly_summary_groceries() {
    let db = Database::in_memory().unwrap();
    for amount in ["10.00", "20.00", "5.00"] {
        db.insert_transaction(&expense("Market", amount, Some("groceries")))
            .unwrap();
    }
    let mut salary = expense("Employer", "100.00", None);
    salary.transaction_type = TransactionType::Income;
    db.insert_transaction(&salary).unwrap();

    let summary = db.monthly_summary(2024, 3, None).unwrap();
    assert_eq!(summary.total_expense, dec("35.00"));
    assert_eq!(summary.total_income, dec("100.00"));
    assert_eq!(summary.net, dec("65.00"));
    assert_eq!(summary.categories["groceries"], dec("35.00"));
}

#[test]
fn test_list_sorted_by_amount_and_bogus_sort() {
    let db = Database::in_memory().unwrap();
    for amount in ["5", "20", "10"] {
        db.insert_transaction(&expense("Shop", amount, None)).unwrap();
    }

    let params = ListParams {
        sort_by: Some("amount".into()),
        sort_order: Some("desc".into()),
        ..Default::default()
    };
    let (filter, sort, page) = params.parse(100).unwrap();
    let listed = db.list_transactions(&filter, sort, page).unwrap();
    let amounts: Vec<Decimal> = listed.transactions.iter().map(|t| t.amount).collect();
    assert_eq!(amounts, vec![dec("20"), dec("10"), dec("5")]);

    let bogus = ListParams {
        sort_by: Some("bogus".into()),
        ..Default::default()
    };
    assert!(matches!(bogus.parse(100), Err(Error::InvalidSort(_))));
}

#[test]
fn test_page_size_capped() {
    let db = Database::in_memory().unwrap();
    for i in 0..5 {
        db.insert_transaction(&expense("Shop", &format!("{}", i + 1), None))
            .unwrap();
    }

    let params = ListParams {
        limit: Some("1000".into()),
        ..Default::default()
    };
    let (filter, sort, page) = params.parse(3).unwrap();
    let listed = db.list_transactions(&filter, sort, page).unwrap();
    assert_eq!(listed.limit, 3);
    assert_eq!(listed.transactions.len(), 3);
    assert_eq!(listed.total, 5);
}
