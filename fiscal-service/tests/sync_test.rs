//! Document sync integration tests: the provider is authoritative and the
//! operation is idempotent.

mod common;

use common::{issued_document_body, TestApp};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn issue_invoice_receipt(app: &TestApp, sale_id: &str, payment_id: &str) {
    Mock::given(method("POST"))
        .and(path("/documents"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(issued_document_body(101, "FR 2026/101")),
        )
        .up_to_n_times(1)
        .mount(&app.provider)
        .await;

    let response = app
        .post(
            &format!("/sales/{}/documents", sale_id),
            &json!({ "document_type": "invoice_receipt", "payment_id": payment_id }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn sync_overwrites_local_state_with_provider_snapshot() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("100.00", Some("PT123456789"), true).await;
    let payment_id = app.create_payment(&sale_id, "100.00", "2026-01-10").await;
    issue_invoice_receipt(&app, &sale_id, &payment_id).await;

    Mock::given(method("GET"))
        .and(path("/documents/101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 101,
            "reference": "FR 2026/101",
            "document_type": "invoice_receipt",
            "status": "settled",
            "pdf_url": "https://provider.test/docs/101-v2.pdf",
            "qr_code_url": "https://provider.test/docs/101-v2.png"
        })))
        .mount(&app.provider)
        .await;

    let sync_url = format!("/sales/{}/payments/{}/sync-document", sale_id, payment_id);
    let response = app.post(&sync_url, &json!({})).await;
    assert_eq!(response.status().as_u16(), 200);

    let snapshot: Value = response.json().await.unwrap();
    assert_eq!(snapshot["status"], "settled");
    assert_eq!(snapshot["pdf_url"], "https://provider.test/docs/101-v2.pdf");

    // Repeating the sync converges to the same state.
    let repeat: Value = app.post(&sync_url, &json!({})).await.json().await.unwrap();
    assert_eq!(repeat, snapshot);

    let detail: Value = app
        .get(&format!("/sales/{}", sale_id))
        .await
        .json()
        .await
        .unwrap();
    let payment = &detail["payments"].as_array().unwrap()[0];
    assert_eq!(payment["pdf_url"], "https://provider.test/docs/101-v2.pdf");
    let document = &detail["documents"].as_array().unwrap()[0];
    assert_eq!(document["status"], "settled");
    // Cached lines survive the overwrite.
    assert_eq!(document["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn sync_without_a_document_is_rejected() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("100.00", None, false).await;
    let payment_id = app.create_payment(&sale_id, "50.00", "2026-01-10").await;

    let response = app
        .post(
            &format!("/sales/{}/payments/{}/sync-document", sale_id, payment_id),
            &json!({}),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn sync_reflects_provider_side_cancellation() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("100.00", Some("PT123456789"), true).await;
    let payment_id = app.create_payment(&sale_id, "100.00", "2026-01-10").await;
    issue_invoice_receipt(&app, &sale_id, &payment_id).await;

    Mock::given(method("GET"))
        .and(path("/documents/101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 101,
            "reference": "FR 2026/101",
            "document_type": "invoice_receipt",
            "status": "cancelled",
            "cancellation_reason": "cancelled at the provider portal"
        })))
        .mount(&app.provider)
        .await;

    let snapshot: Value = app
        .post(
            &format!("/sales/{}/payments/{}/sync-document", sale_id, payment_id),
            &json!({}),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["status"], "cancelled");
    assert_eq!(
        snapshot["cancellation_reason"],
        "cancelled at the provider portal"
    );
}
