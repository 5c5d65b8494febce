//! API tests for the audit trail, history queries, config, and metrics
//! endpoints.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use rust_decimal_macros::dec;
use serde_json::json;

use common::{fixtures, TestFixture};

fn ticket_json(no: &str) -> serde_json::Value {
    serde_json::to_value(fixtures::ticket(no, dec!(1200), dec!(36))).unwrap()
}

/// The audit writer runs on a background task; give it a moment to drain.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_config_endpoint_redacts_api_key() {
    let fixture = TestFixture::new().await;

    let resp = fixture.get("/api/v1/config").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["backoffice"]["api_key_configured"], json!(true));
    assert!(resp.body["backoffice"].get("api_key").is_none());
    assert_eq!(
        resp.body["backoffice"]["base_url"],
        json!("http://backoffice.test:9200")
    );
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_engine_counters() {
    let fixture = TestFixture::new().await;

    fixture
        .post("/api/v1/session", json!({"operation": "renewal"}))
        .await;

    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/api/v1/metrics")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(fixture.router.clone(), request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("pledgedesk_sessions_started_total"));
    assert!(text.contains("pledgedesk_http_requests_total"));
}

#[tokio::test]
async fn test_audit_trail_records_session_lifecycle() {
    let fixture = TestFixture::new().await;

    fixture
        .post("/api/v1/session", json!({"operation": "renewal"}))
        .await;
    fixture
        .post("/api/v1/session/tickets", ticket_json("B/0725/1234"))
        .await;
    fixture.delete("/api/v1/session").await;
    settle().await;

    let resp = fixture.get("/api/v1/audit").await;
    assert_eq!(resp.status, StatusCode::OK);
    let events = resp.body["events"].as_array().unwrap();
    let types: Vec<&str> = events
        .iter()
        .map(|e| e["event_type"].as_str().unwrap())
        .collect();
    assert!(types.contains(&"session_started"));
    assert!(types.contains(&"ticket_added"));
    assert!(types.contains(&"session_ended"));
}

#[tokio::test]
async fn test_audit_query_filters_by_event_type() {
    let fixture = TestFixture::new().await;

    fixture
        .post("/api/v1/session", json!({"operation": "renewal"}))
        .await;
    fixture
        .post("/api/v1/session/tickets", ticket_json("B/0725/1234"))
        .await;
    fixture
        .post("/api/v1/session/tickets", ticket_json("B/0725/5678"))
        .await;
    settle().await;

    let resp = fixture.get("/api/v1/audit?event_type=ticket_added").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["total"], json!(2));
    for event in resp.body["events"].as_array().unwrap() {
        assert_eq!(event["event_type"], json!("ticket_added"));
    }
}

#[tokio::test]
async fn test_audit_query_filters_by_ticket_no() {
    let fixture = TestFixture::new().await;

    fixture
        .post("/api/v1/session", json!({"operation": "renewal"}))
        .await;
    fixture
        .post("/api/v1/session/tickets", ticket_json("B/0725/1234"))
        .await;
    fixture
        .post("/api/v1/session/tickets", ticket_json("B/0725/5678"))
        .await;
    settle().await;

    let resp = fixture
        .get("/api/v1/audit?ticket_no=B%2F0725%2F5678")
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["total"], json!(1));
}

#[tokio::test]
async fn test_history_listing_with_filters() {
    use chrono::Utc;
    use pledgedesk_core::Transaction;

    let fixture = TestFixture::new().await;

    // Seed durable history directly through the store
    let records = [
        Transaction::Renewal {
            transaction_id: "T1".to_string(),
            ticket_no: "B/0725/1001".parse().unwrap(),
            new_ticket_no: None,
            amount: dec!(36),
            receipts: vec!["R-T1".to_string()],
            committed_at: Utc::now(),
        },
        Transaction::Redemption {
            transaction_id: "T2".to_string(),
            ticket_no: "B/0725/1002".parse().unwrap(),
            amount: dec!(1236),
            receipts: vec!["R-T2".to_string()],
            committed_at: Utc::now(),
        },
        Transaction::Renewal {
            transaction_id: "T3".to_string(),
            ticket_no: "B/0725/1001".parse().unwrap(),
            new_ticket_no: None,
            amount: dec!(36),
            receipts: vec!["R-T3".to_string()],
            committed_at: Utc::now(),
        },
    ];
    for txn in &records {
        fixture.history.append(txn).expect("append");
    }

    let resp = fixture.get("/api/v1/history").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["total"], json!(3));

    let resp = fixture.get("/api/v1/history?kind=renewal").await;
    assert_eq!(resp.body["total"], json!(2));

    let resp = fixture
        .get("/api/v1/history?ticket_no=B%2F0725%2F1002")
        .await;
    assert_eq!(resp.body["total"], json!(1));
    assert_eq!(resp.body["transactions"][0]["transaction_id"], json!("T2"));

    let resp = fixture.get("/api/v1/history?limit=1&offset=1").await;
    assert_eq!(resp.body["transactions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_transaction_is_not_found() {
    let fixture = TestFixture::new().await;

    let resp = fixture.get("/api/v1/history/T999").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
