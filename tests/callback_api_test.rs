use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use bigdecimal::BigDecimal;
use sacco_webhook::adapters::{MemoryOp, MemoryStore};
use sacco_webhook::config::Config;
use sacco_webhook::domain::{SavingsRecord, TransactionRecord, TransactionStatus};
use sacco_webhook::ports::SaccoStore;
use sacco_webhook::{create_app, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_transaction(&TransactionRecord::new(
            "tx-1",
            "user-1",
            "MOMO-REF-1",
            BigDecimal::from(5000),
            Some("deposit".to_string()),
            Some("Mobile Money".to_string()),
        ))
        .await
        .unwrap();
    store
        .insert_savings(&SavingsRecord::new("sav-1", "user-1", "tx-1", BigDecimal::from(5000)))
        .await
        .unwrap();
    store
}

fn app(store: Arc<MemoryStore>) -> Router {
    create_app(AppState::new(store, &Config::default()))
}

fn json_callback(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/momo-callback")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_successful_callback_completes_transaction() {
    let store = seeded_store().await;

    let response = app(store.clone())
        .oneshot(json_callback(json!({
            "transactionId": "MOMO-REF-1",
            "status": "SUCCESSFUL",
            "amount": "5000"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Callback received and processed");

    let tx = store.get_transaction("user-1", "tx-1").await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert!(tx.completed_at.is_some());
    assert!(tx.error.is_none());

    let savings = store.find_savings_by_transaction("user-1", "tx-1").await.unwrap();
    assert_eq!(savings[0].status, TransactionStatus::Completed);

    let notifications = store.list_notifications("user-1").await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].title, "Payment Successful");
    assert_eq!(
        notifications[0].message,
        "Your deposit of UGX 5000.00 via Mobile Money has been completed successfully."
    );

    let callback = store.get_callback("MOMO-REF-1").await.unwrap().unwrap();
    assert!(callback.processed);
}

#[tokio::test]
async fn test_missing_transaction_id_is_rejected() {
    let store = seeded_store().await;

    let response = app(store.clone())
        .oneshot(json_callback(json!({ "status": "SUCCESSFUL" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Missing transactionId");
    assert_eq!(store.callback_counts().await.unwrap().total, 0);
}

#[tokio::test]
async fn test_external_id_is_accepted_as_transaction_id() {
    let store = seeded_store().await;

    let response = app(store.clone())
        .oneshot(json_callback(json!({
            "externalId": "MOMO-REF-1",
            "status": "PENDING"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let tx = store.get_transaction("user-1", "tx-1").await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Processing);
    assert_eq!(tx.error.as_deref(), Some("Payment is being processed"));
}

#[tokio::test]
async fn test_unknown_reference_is_acknowledged_and_stored() {
    let store = seeded_store().await;

    let response = app(store.clone())
        .oneshot(json_callback(json!({
            "transactionId": "UNKNOWN-REF",
            "status": "SUCCESSFUL"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let callback = store.get_callback("UNKNOWN-REF").await.unwrap().unwrap();
    assert!(!callback.processed);
    assert!(store.list_notifications("user-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_form_encoded_callback() {
    let store = seeded_store().await;

    let response = app(store.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/momo-callback")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("transactionId=MOMO-REF-1&status=SUCCESS"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let tx = store.get_transaction("user-1", "tx-1").await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Completed);
}

#[tokio::test]
async fn test_failed_callback_uses_provider_message() {
    let store = seeded_store().await;

    let response = app(store.clone())
        .oneshot(json_callback(json!({
            "transactionId": "MOMO-REF-1",
            "status": "FAILED",
            "message": "Insufficient balance"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let tx = store.get_transaction("user-1", "tx-1").await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Failed);
    assert_eq!(tx.error.as_deref(), Some("Insufficient balance"));
    assert!(tx.completed_at.is_none());

    let notifications = store.list_notifications("user-1").await.unwrap();
    assert_eq!(notifications[0].title, "Payment Failed");
    assert_eq!(
        notifications[0].message,
        "Your deposit of UGX 5000.00 via Mobile Money failed. Insufficient balance"
    );
}

#[tokio::test]
async fn test_redelivery_overwrites_earlier_callback() {
    let store = seeded_store().await;
    let router = app(store.clone());

    router
        .clone()
        .oneshot(json_callback(json!({
            "transactionId": "MOMO-REF-1",
            "status": "PENDING"
        })))
        .await
        .unwrap();
    let response = router
        .oneshot(json_callback(json!({
            "transactionId": "MOMO-REF-1",
            "status": "SUCCESSFUL"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let tx = store.get_transaction("user-1", "tx-1").await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert_eq!(store.callback_counts().await.unwrap().total, 1);
    assert_eq!(store.list_notifications("user-1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_store_failure_returns_internal_error() {
    let store = seeded_store().await;
    store.fail_on(MemoryOp::UpdateTransaction);

    let response = app(store.clone())
        .oneshot(json_callback(json!({
            "transactionId": "MOMO-REF-1",
            "status": "SUCCESSFUL"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "Internal Server Error");

    let callback = store.get_callback("MOMO-REF-1").await.unwrap().unwrap();
    assert!(!callback.processed);
}

#[tokio::test]
async fn test_large_callback_is_processed_with_body_logging() {
    let store = seeded_store().await;
    let config = Config {
        log_request_body: true,
        ..Config::default()
    };
    let padding = "x".repeat(20 * 1024);

    let response = create_app(AppState::new(store.clone(), &config))
        .oneshot(json_callback(json!({
            "transactionId": "MOMO-REF-1",
            "status": "SUCCESSFUL",
            "note": padding
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let callback = store.get_callback("MOMO-REF-1").await.unwrap().unwrap();
    assert!(callback.processed);
}
