//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use mony_core::ai::{MockBackend, MockReply};
use mony_core::config::ExtractionConfig;
use mony_core::test_utils::MockOllamaServer;
use rust_decimal::Decimal;
use std::time::Duration;
use tower::ServiceExt;

const BOUNDARY: &str = "mony-test-boundary";

fn test_config() -> Config {
    Config {
        max_upload_bytes: 64 * 1024,
        extraction: ExtractionConfig {
            timeout: Duration::from_secs(5),
            max_attempts: 2,
            retry_delay: Duration::from_millis(1),
            prompts_dir: None,
        },
        ..Config::default()
    }
}

fn setup_test_app() -> Router {
    setup_app_with(MockBackend::new(), test_config())
}

fn setup_app_with(mock: MockBackend, config: Config) -> Router {
    let db = Database::in_memory().unwrap();
    create_router_with_ai(db, config, ServerConfig::default(), Some(AIClient::Mock(mock))).unwrap()
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// One file part plus optional text parts
fn multipart_body(
    content_type: Option<&str>,
    filename: &str,
    data: &[u8],
    text_parts: &[(&str, &str)],
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in text_parts {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"receipt\"; filename=\"{}\"\r\n",
            BOUNDARY, filename
        )
        .as_bytes(),
    );
    if let Some(ct) = content_type {
        body.extend_from_slice(format!("Content-Type: {}\r\n", ct).as_bytes());
    }
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: &str, uri: &str, json: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn sample_transaction(merchant: &str, amount: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "expense",
        "merchant": merchant,
        "date": "2024-03-15",
        "amount": amount,
        "currency": "usd",
        "category": "groceries",
        "items": [{"name": "Milk", "quantity": "2", "unit_price": "1.25", "total_price": "2.50"}]
    })
}

async fn create(app: &Router, merchant: &str, amount: &str) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/transactions",
            sample_transaction(merchant, amount),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    get_body_json(response).await
}

fn dec(v: &serde_json::Value) -> Decimal {
    v.as_str().unwrap().parse().unwrap()
}

// ========== Health ==========

#[tokio::test]
async fn test_health_with_mock_backend() {
    let app = setup_test_app();
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["database"], true);
    assert_eq!(json["ai"]["configured"], true);
}

#[tokio::test]
async fn test_health_without_ai_is_degraded() {
    let db = Database::in_memory().unwrap();
    let app = create_router_with_ai(db, test_config(), ServerConfig::default(), None).unwrap();
    let json = get_body_json(app.oneshot(get("/health")).await.unwrap()).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["ai"]["configured"], false);
}

// ========== Transaction API Tests ==========

#[tokio::test]
async fn test_create_and_get_transaction() {
    let app = setup_test_app();
    let created = create(&app, "  Corner Market ", "25.50").await;

    assert_eq!(created["merchant"], "Corner Market");
    assert_eq!(created["currency"], "USD");
    assert_eq!(created["type"], "expense");
    assert_eq!(dec(&created["amount"]), "25.50".parse::<Decimal>().unwrap());

    let id = created["id"].as_i64().unwrap();
    let response = app
        .oneshot(get(&format!("/api/transactions/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = get_body_json(response).await;
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_create_reports_every_invalid_field() {
    let app = setup_test_app();
    let mut body = sample_transaction("", "-1");
    body["currency"] = "dollars".into();

    let response = app
        .oneshot(json_request("POST", "/api/transactions", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = get_body_json(response).await;
    assert_eq!(json["error_kind"], "ValidationFailure");
    let fields: Vec<&str> = json["details"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["merchant", "currency", "amount"]);
}

#[tokio::test]
async fn test_create_malformed_body() {
    let app = setup_test_app();
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/transactions",
            serde_json::json!({"merchant": "x"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = get_body_json(response).await;
    assert_eq!(json["error_kind"], "ValidationFailure");
}

#[tokio::test]
async fn test_get_missing_transaction() {
    let app = setup_test_app();
    let response = app.oneshot(get("/api/transactions/4242")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = get_body_json(response).await;
    assert_eq!(json["error_kind"], "NotFound");
}

#[tokio::test]
async fn test_update_transaction() {
    let app = setup_test_app();
    let created = create(&app, "Cafe", "4.50").await;
    let id = created["id"].as_i64().unwrap();

    let mut body = sample_transaction("Cafe Central", "5.00");
    body["type"] = "income".into();
    let response = app
        .clone()
        .oneshot(json_request("PUT", &format!("/api/transactions/{}", id), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = get_body_json(response).await;
    assert_eq!(updated["merchant"], "Cafe Central");
    assert_eq!(updated["type"], "income");
    assert_eq!(updated["created_at"], created["created_at"]);

    let response = app
        .oneshot(json_request(
            "PUT",
            "/api/transactions/999",
            sample_transaction("X", "1.00"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_transaction() {
    let app = setup_test_app();
    let created = create(&app, "Cafe", "4.50").await;
    let uri = format!("/api/transactions/{}", created["id"]);

    let delete = |uri: &str| {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(delete(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(delete(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_sorted_and_paged() {
    let app = setup_test_app();
    for amount in ["5.00", "20.00", "10.00"] {
        create(&app, "Shop", amount).await;
    }

    let response = app
        .clone()
        .oneshot(get("/api/transactions?sort_by=amount&sort_order=desc&limit=2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["total"], 3);
    assert_eq!(json["limit"], 2);
    let amounts: Vec<Decimal> = json["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| dec(&t["amount"]))
        .collect();
    assert_eq!(amounts, vec!["20.00".parse().unwrap(), "10.00".parse::<Decimal>().unwrap()]);
}

#[tokio::test]
async fn test_list_rejects_bogus_sort() {
    let app = setup_test_app();
    let response = app
        .oneshot(get("/api/transactions?sort_by=bogus"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert_eq!(json["error_kind"], "InvalidSort");
}

#[tokio::test]
async fn test_list_rejects_bad_filter() {
    let app = setup_test_app();
    for uri in [
        "/api/transactions?type=saving",
        "/api/transactions?date_from=yesterday",
        "/api/transactions?limit=0",
    ] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        let json = get_body_json(response).await;
        assert_eq!(json["error_kind"], "InvalidFilter");
    }
}

#[tokio::test]
async fn test_list_page_size_capped() {
    let app = setup_test_app();
    let response = app
        .oneshot(get("/api/transactions?limit=5000"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["limit"], 100);
}

#[tokio::test]
async fn test_search_endpoint() {
    let app = setup_test_app();
    create(&app, "Coffee House", "3.00").await;
    create(&app, "Hardware", "30.00").await;

    let response = app
        .clone()
        .oneshot(get("/api/transactions/search?q=coffee"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);

    let response = app
        .oneshot(get("/api/transactions/search?q=c"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Aggregation ==========

#[tokio::test]
async fn test_monthly_summary_endpoint() {
    let app = setup_test_app();
    for amount in ["10.00", "20.00", "5.00"] {
        create(&app, "Market", amount).await;
    }
    let mut income = sample_transaction("Employer", "100.00");
    income["type"] = "income".into();
    income["category"] = "salary".into();
    app.clone()
        .oneshot(json_request("POST", "/api/transactions", income))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(get("/api/transactions/summary/monthly?year=2024&month=3"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(dec(&json["total_expense"]), "35.00".parse::<Decimal>().unwrap());
    assert_eq!(dec(&json["total_income"]), "100.00".parse::<Decimal>().unwrap());
    assert_eq!(dec(&json["net"]), "65.00".parse::<Decimal>().unwrap());
    assert_eq!(dec(&json["categories"]["groceries"]), "35.00".parse::<Decimal>().unwrap());

    let response = app
        .oneshot(get("/api/transactions/summary/monthly?year=2024&month=13"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats_endpoint() {
    let app = setup_test_app();
    create(&app, "Market", "10.00").await;

    let response = app
        .clone()
        .oneshot(get("/api/transactions/stats?date_from=2024-01-01&date_to=2024-12-31"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["totals"]["expense"]["count"], 1);
    assert_eq!(dec(&json["net_worth"]), "-10.00".parse::<Decimal>().unwrap());
    assert_eq!(json["since"], "2024-03-15");

    let response = app
        .oneshot(get("/api/transactions/stats?date_from=2024-12-31&date_to=2024-01-01"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_numeric_id_uses_error_payload() {
    let app = setup_test_app();

    let requests = [
        get("/api/transactions/abc"),
        json_request("PUT", "/api/transactions/abc", sample_transaction("Cafe", "4.50")),
        Request::builder()
            .method("DELETE")
            .uri("/api/transactions/abc")
            .body(Body::empty())
            .unwrap(),
    ];
    for request in requests {
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = get_body_json(response).await;
        assert_eq!(json["error_kind"], "InvalidRequest");
        assert!(json["message"].as_str().unwrap().contains("abc"));
    }
}

#[tokio::test]
async fn test_undecodable_query_uses_error_payload() {
    let app = setup_test_app();

    let response = app
        .oneshot(get("/api/transactions/search?q=milk&q=bread"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert_eq!(json["error_kind"], "InvalidFilter");
}

// ========== Receipt API Tests ==========

#[tokio::test]
async fn test_extract_receipt_preview() {
    let mock = MockBackend::new();
    let app = setup_app_with(mock.clone(), test_config());

    let body = multipart_body(Some("image/jpeg"), "receipt.jpg", b"\xff\xd8jpeg", &[]);
    let response = app
        .clone()
        .oneshot(upload_request("/api/receipts/extract", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["receipt"]["merchant"], "Corner Market");
    assert!(json["warnings"].as_array().unwrap().is_empty());
    assert_eq!(mock.calls(), 1);

    // Preview never persists
    let list = get_body_json(app.oneshot(get("/api/transactions")).await.unwrap()).await;
    assert_eq!(list["total"], 0);
}

#[tokio::test]
async fn test_extract_rejects_unsupported_type_without_model_call() {
    let mock = MockBackend::new();
    let app = setup_app_with(mock.clone(), test_config());

    let body = multipart_body(Some("application/pdf"), "receipt.pdf", b"%PDF", &[]);
    let response = app
        .oneshot(upload_request("/api/receipts/extract", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let json = get_body_json(response).await;
    assert_eq!(json["error_kind"], "UnsupportedMediaType");
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_extract_rejects_oversized_upload() {
    let mock = MockBackend::new();
    let config = test_config();
    let data = vec![0u8; config.max_upload_bytes + 1];
    let app = setup_app_with(mock.clone(), config);

    let body = multipart_body(Some("image/png"), "receipt.png", &data, &[]);
    let response = app
        .oneshot(upload_request("/api/receipts/extract", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = get_body_json(response).await;
    assert_eq!(json["error_kind"], "PayloadTooLarge");
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_extract_guesses_type_from_filename() {
    let app = setup_test_app();
    let body = multipart_body(None, "scan.PNG", b"png-bytes", &[]);
    let response = app
        .oneshot(upload_request("/api/receipts/extract", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_extract_missing_part() {
    let app = setup_test_app();
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    let response = app
        .oneshot(upload_request("/api/receipts/extract", body.into_bytes()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_submit_receipt_persists() {
    let app = setup_test_app();
    let body = multipart_body(
        Some("image/png"),
        "receipt.png",
        b"png-bytes",
        &[("transaction_type", "expense")],
    );
    let response = app
        .clone()
        .oneshot(upload_request("/api/receipts", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = get_body_json(response).await;
    let id = json["transaction"]["id"].as_i64().unwrap();
    assert_eq!(json["transaction"]["amount"], json["receipt"]["total_amount"]);
    assert_eq!(json["transaction"]["items"].as_array().unwrap().len(), 2);

    let response = app
        .oneshot(get(&format!("/api/transactions/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_submit_rejects_unknown_type() {
    let app = setup_test_app();
    let body = multipart_body(
        Some("image/png"),
        "receipt.png",
        b"png-bytes",
        &[("transaction_type", "gift")],
    );
    let response = app
        .oneshot(upload_request("/api/receipts", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_extraction_timeout_maps_to_504() {
    let mock = MockBackend::with_replies([MockReply::Delayed(
        Duration::from_millis(500),
        "{}".into(),
    )]);
    let mut config = test_config();
    config.extraction.timeout = Duration::from_millis(20);
    let app = setup_app_with(mock.clone(), config);

    let body = multipart_body(Some("image/png"), "r.png", b"png", &[]);
    let response = app
        .oneshot(upload_request("/api/receipts", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let json = get_body_json(response).await;
    assert_eq!(json["error_kind"], "ExtractionTimeout");
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn test_unparseable_output_maps_to_502() {
    let mock = MockBackend::with_text("I could not read this receipt, sorry.");
    let app = setup_app_with(mock, test_config());

    let body = multipart_body(Some("image/png"), "r.png", b"png", &[]);
    let response = app
        .clone()
        .oneshot(upload_request("/api/receipts", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = get_body_json(response).await;
    assert_eq!(json["error_kind"], "ExtractionParseError");
    // Raw model output stays in the logs
    assert!(!json["message"].as_str().unwrap().contains("sorry"));

    let list = get_body_json(app.oneshot(get("/api/transactions")).await.unwrap()).await;
    assert_eq!(list["total"], 0);
}

#[tokio::test]
async fn test_extract_survives_out_of_range_item_prices() {
    let mock = MockBackend::with_text(
        r#"{"merchant": "Bulk Store", "date": "2024-03-15", "total_amount": 10,
            "items": [{"name": "Pallet", "quantity": 1e20, "unit_price": 1e20}]}"#,
    );
    let app = setup_app_with(mock, test_config());

    let body = multipart_body(Some("image/png"), "r.png", b"png", &[]);
    let response = app
        .oneshot(upload_request("/api/receipts/extract", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(dec(&json["receipt"]["items"][0]["total_price"]), Decimal::ZERO);
    let warnings = json["warnings"].as_array().unwrap();
    assert!(warnings
        .iter()
        .any(|w| w["field"] == "items[0].total_price"));
}

#[tokio::test]
async fn test_extract_requires_multipart_body() {
    let mock = MockBackend::new();
    let app = setup_app_with(mock.clone(), test_config());

    for uri in ["/api/receipts/extract", "/api/receipts"] {
        let response = app
            .clone()
            .oneshot(json_request("POST", uri, serde_json::json!({"receipt": "x"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        let json = get_body_json(response).await;
        assert_eq!(json["error_kind"], "InvalidRequest");
        assert!(json["message"].is_string());
    }
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_extract_through_ollama_http() {
    let server = MockOllamaServer::start().await;
    let db = Database::in_memory().unwrap();
    let client = AIClient::ollama(&server.url(), "llava");
    let app = create_router_with_ai(db, test_config(), ServerConfig::default(), Some(client)).unwrap();

    let body = multipart_body(Some("image/jpeg"), "r.jpg", b"jpeg", &[]);
    let response = app
        .oneshot(upload_request("/api/receipts/extract", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["receipt"]["merchant"], "Target");
    assert_eq!(server.hits(), 1);
    let request = server.last_request().unwrap();
    assert_eq!(request.model, "llava");
    assert_eq!(request.images.len(), 1);
}

#[tokio::test]
async fn test_ollama_5xx_exhausts_retries() {
    let server = MockOllamaServer::failing(503).await;
    let db = Database::in_memory().unwrap();
    let client = AIClient::ollama(&server.url(), "llava");
    let app = create_router_with_ai(db, test_config(), ServerConfig::default(), Some(client)).unwrap();

    let body = multipart_body(Some("image/jpeg"), "r.jpg", b"jpeg", &[]);
    let response = app
        .oneshot(upload_request("/api/receipts/extract", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = get_body_json(response).await;
    assert_eq!(json["error_kind"], "ExtractionUnavailable");
    assert_eq!(server.hits(), 2);
}
