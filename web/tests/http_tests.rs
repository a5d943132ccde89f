//! HTTP-level tests for the Kasir router.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use axum::http::StatusCode;
use axum_test::TestServer;
use kasir_core::environment::TimestampIdGenerator;
use kasir_core::tabular::{Table, product_col};
use kasir_core::Cell;
use kasir_runtime::metrics::MetricsExporter;
use kasir_runtime::{PosConfig, PosService};
use kasir_testing::fixtures::product_row;
use kasir_testing::{MemoryTabularStore, test_clock};
use kasir_web::{AppState, CORRELATION_ID_HEADER, build_router};
use serde_json::{Value, json};
use std::sync::Arc;

fn service(store: &Arc<MemoryTabularStore>) -> PosService {
    let clock = Arc::new(test_clock());
    let ids = Arc::new(TimestampIdGenerator::new(clock.clone()));
    PosService::with_environment(store.clone(), clock, ids, PosConfig::default())
}

fn server(store: &Arc<MemoryTabularStore>) -> TestServer {
    TestServer::new(build_router(AppState::new(service(store)))).unwrap()
}

fn sale(product: &str, quantity: i64) -> Value {
    json!({
        "action": "recordTransaction",
        "payload": {
            "customerName": "Budi",
            "rme": "RME-7",
            "items": [
                {
                    "id": product,
                    "name": "Shampoo",
                    "type": "product",
                    "price": 12000,
                    "quantity": quantity
                }
            ],
            "subtotal": 12000 * quantity,
            "discount": 0,
            "total": 12000 * quantity,
            "paymentMethod": "cash"
        }
    })
}

#[tokio::test]
async fn health_reports_version() {
    let server = server(&Arc::new(MemoryTabularStore::new()));

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn ready_waits_for_bootstrap() {
    let store = Arc::new(MemoryTabularStore::new());
    let service = service(&store);
    let server = TestServer::new(build_router(AppState::new(service.clone()))).unwrap();

    let response = server.get("/ready").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    assert!(body["message"].as_str().unwrap().contains("transactions"));

    service.bootstrap().await.unwrap();

    let response = server.get("/ready").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["store"], "memory://kasir");
}

#[tokio::test]
async fn record_transaction_over_http() {
    let store = Arc::new(MemoryTabularStore::with_schema());
    store.seed(Table::Products, vec![product_row("P1", 10)]);
    let server = server(&store);

    let response = server.post("/exec").json(&sale("P1", 2)).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body, json!({"status": "success", "data": "INV-1735689600000"}));
    assert_eq!(store.rows(Table::Transactions).len(), 1);
    assert_eq!(store.rows(Table::Products)[0][product_col::STOCK], Cell::Integer(8));
    assert_eq!(store.rows(Table::Customers).len(), 1);
}

#[tokio::test]
async fn root_path_accepts_envelopes() {
    let store = Arc::new(MemoryTabularStore::with_schema());
    store.seed(Table::Products, vec![product_row("P1", 10)]);
    let server = server(&store);

    let response = server
        .post("/")
        .json(&json!({"action": "getSheetData", "payload": {"sheetName": "products"}}))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"][0][0], "P1");
}

#[tokio::test]
async fn errors_travel_inside_the_envelope() {
    let server = server(&Arc::new(MemoryTabularStore::with_schema()));

    let response = server
        .post("/exec")
        .json(&json!({"action": "launchRocket", "payload": {}}))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "error");
    assert!(body["error"].as_str().unwrap().contains("launchRocket"));
}

#[tokio::test]
async fn malformed_json_is_an_error_envelope() {
    let store = Arc::new(MemoryTabularStore::with_schema());
    let server = server(&store);

    let response = server.post("/exec").text("{not json").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "error");
    assert!(body["error"].as_str().unwrap().starts_with("Validation failed: malformed request"));
    assert!(store.rows(Table::Transactions).is_empty());
}

#[tokio::test]
async fn missing_table_fails_the_commit() {
    let store = Arc::new(MemoryTabularStore::with_schema());
    store.seed(Table::Products, vec![product_row("P1", 10)]);
    store.drop_table(Table::Transactions);
    let server = server(&store);

    let response = server.post("/exec").json(&sale("P1", 1)).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"], "Table unavailable: transactions");
    assert_eq!(store.rows(Table::Products)[0][product_col::STOCK], Cell::Integer(10));
}

#[tokio::test]
async fn metrics_disabled_is_not_found() {
    let server = server(&Arc::new(MemoryTabularStore::new()));

    server
        .get("/metrics")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn uninstalled_metrics_recorder_is_internal_error() {
    let service = service(&Arc::new(MemoryTabularStore::new()));
    let state = AppState::new(service).with_metrics(MetricsExporter::new());
    let server = TestServer::new(build_router(state)).unwrap();

    let response = server.get("/metrics").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["code"], "INTERNAL_SERVER_ERROR");
}

#[tokio::test]
async fn responses_carry_a_correlation_id() {
    let server = server(&Arc::new(MemoryTabularStore::new()));

    let response = server.get("/health").await;

    let header = response.header(CORRELATION_ID_HEADER);
    assert!(uuid::Uuid::parse_str(header.to_str().unwrap()).is_ok());
}
