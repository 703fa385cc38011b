//! Fiscal document lifecycle integration tests against a mocked provider.

mod common;

use common::{issued_document_body, provider_error_body, TestApp};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn mock_issue(app: &TestApp, id: i64, reference: &str) {
    Mock::given(method("POST"))
        .and(path("/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(issued_document_body(id, reference)))
        .up_to_n_times(1)
        .mount(&app.provider)
        .await;
}

#[tokio::test]
async fn invoice_requires_customer_tax_id() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("100.00", None, true).await;

    let response = app
        .post(
            &format!("/sales/{}/documents", sale_id),
            &json!({ "document_type": "invoice" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn disabled_provider_blocks_issuance() {
    let app = TestApp::spawn().await;
    app.put(
        "/organization/settings",
        &json!({ "default_tax_rate": "23.00", "fiscal_provider_enabled": false }),
    )
    .await;
    let sale_id = app.create_sale("100.00", Some("PT123456789"), true).await;

    let response = app
        .post(
            &format!("/sales/{}/documents", sale_id),
            &json!({ "document_type": "invoice" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn draft_preview_computes_totals_without_issuing() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("123.00", Some("PT123456789"), true).await;

    let response = app
        .post(
            &format!("/sales/{}/documents/preview", sale_id),
            &json!({ "document_type": "invoice" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let preview: Value = response.json().await.unwrap();
    // One net-priced item of 123.00 at the 23% default rate.
    assert_eq!(preview["subtotal"], "123.00");
    assert_eq!(preview["tax_total"], "28.29");
    assert_eq!(preview["total"], "151.29");

    // Nothing reached the provider.
    assert!(app.provider.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn issue_invoice_links_it_to_the_sale() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("100.00", Some("PT123456789"), true).await;
    mock_issue(&app, 201, "FT 2026/201").await;

    let response = app
        .post(
            &format!("/sales/{}/documents", sale_id),
            &json!({ "document_type": "invoice" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let issued: Value = response.json().await.unwrap();
    assert_eq!(issued["document"]["reference"], "FT 2026/201");
    assert_eq!(issued["document"]["document_type"], "invoice");

    let detail: Value = app
        .get(&format!("/sales/{}", sale_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(detail["sale"]["invoice_reference"], "FT 2026/201");
    assert_eq!(detail["documents"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn second_invoice_on_same_sale_conflicts() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("100.00", Some("PT123456789"), true).await;
    mock_issue(&app, 201, "FT 2026/201").await;

    app.post(
        &format!("/sales/{}/documents", sale_id),
        &json!({ "document_type": "invoice" }),
    )
    .await;

    let response = app
        .post(
            &format!("/sales/{}/documents", sale_id),
            &json!({ "document_type": "invoice" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn issue_invoice_receipt_marks_payment_paid() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("100.00", Some("PT123456789"), true).await;
    let payment_id = app.create_payment(&sale_id, "100.00", "2026-01-10").await;
    mock_issue(&app, 101, "FR 2026/101").await;

    let response = app
        .post(
            &format!("/sales/{}/documents", sale_id),
            &json!({ "document_type": "invoice_receipt", "payment_id": payment_id }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let issued: Value = response.json().await.unwrap();
    assert_eq!(issued["payment"]["status"], "paid");
    assert_eq!(issued["payment"]["document_reference"], "FR 2026/101");
    assert_eq!(issued["payment"]["provider_document_id"], 101);
}

#[tokio::test]
async fn receipt_requires_an_existing_invoice() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("100.00", Some("PT123456789"), true).await;
    let payment_id = app.create_payment(&sale_id, "50.00", "2026-01-10").await;

    let response = app
        .post(
            &format!("/sales/{}/documents", sale_id),
            &json!({ "document_type": "receipt", "payment_id": payment_id }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn covered_payment_rejects_a_second_document() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("100.00", Some("PT123456789"), true).await;
    let payment_id = app.create_payment(&sale_id, "100.00", "2026-01-10").await;
    mock_issue(&app, 101, "FR 2026/101").await;

    app.post(
        &format!("/sales/{}/documents", sale_id),
        &json!({ "document_type": "invoice_receipt", "payment_id": payment_id }),
    )
    .await;

    let response = app
        .post(
            &format!("/sales/{}/documents", sale_id),
            &json!({ "document_type": "invoice_receipt", "payment_id": payment_id }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn cancellation_is_one_way_and_unlinks_the_sale_invoice() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("100.00", Some("PT123456789"), true).await;
    mock_issue(&app, 201, "FT 2026/201").await;

    app.post(
        &format!("/sales/{}/documents", sale_id),
        &json!({ "document_type": "invoice" }),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/documents/201/cancel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 201,
            "reference": "FT 2026/201",
            "document_type": "invoice",
            "status": "cancelled",
            "cancellation_reason": "issued in error"
        })))
        .mount(&app.provider)
        .await;

    let response = app
        .post(
            &format!("/sales/{}/documents/201/cancel", sale_id),
            &json!({ "document_type": "invoice", "reason": "issued in error" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let cancelled: Value = response.json().await.unwrap();
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["cancellation_reason"], "issued in error");

    // The sale no longer carries the invoice linkage.
    let detail: Value = app
        .get(&format!("/sales/{}", sale_id))
        .await
        .json()
        .await
        .unwrap();
    assert!(detail["sale"]["invoice_reference"].is_null());

    // A second cancellation is refused locally.
    let response = app
        .post(
            &format!("/sales/{}/documents/201/cancel", sale_id),
            &json!({ "document_type": "invoice", "reason": "again" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn cancellation_requires_a_reason() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("100.00", Some("PT123456789"), true).await;
    mock_issue(&app, 201, "FT 2026/201").await;

    app.post(
        &format!("/sales/{}/documents", sale_id),
        &json!({ "document_type": "invoice" }),
    )
    .await;

    let response = app
        .post(
            &format!("/sales/{}/documents/201/cancel", sale_id),
            &json!({ "document_type": "invoice", "reason": "" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 422);
}

#[tokio::test]
async fn mismatched_document_type_conflicts() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("100.00", Some("PT123456789"), true).await;
    mock_issue(&app, 201, "FT 2026/201").await;

    app.post(
        &format!("/sales/{}/documents", sale_id),
        &json!({ "document_type": "invoice" }),
    )
    .await;

    let response = app
        .post(
            &format!("/sales/{}/documents/201/cancel", sale_id),
            &json!({ "document_type": "receipt", "reason": "issued in error" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);

    let response = app
        .post(
            &format!("/sales/{}/documents/201/credit-note", sale_id),
            &json!({ "document_type": "credit_note", "reason": "returned goods" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);

    // The document is untouched and the provider saw only the issuance.
    let detail: Value = app
        .get(&format!("/sales/{}", sale_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(detail["documents"][0]["status"], "final");
    assert_eq!(app.provider.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn credit_note_copies_the_original_lines() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("100.00", Some("PT123456789"), true).await;
    mock_issue(&app, 201, "FT 2026/201").await;

    app.post(
        &format!("/sales/{}/documents", sale_id),
        &json!({ "document_type": "invoice" }),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/documents/credit-notes"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(issued_document_body(301, "NC 2026/301")),
        )
        .mount(&app.provider)
        .await;

    let response = app
        .post(
            &format!("/sales/{}/documents/201/credit-note", sale_id),
            &json!({ "document_type": "invoice", "reason": "returned goods" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let credit_note: Value = response.json().await.unwrap();
    assert_eq!(credit_note["document_type"], "credit_note");
    assert_eq!(credit_note["reference"], "NC 2026/301");
    assert_eq!(credit_note["items"].as_array().unwrap().len(), 1);

    // The original document is untouched.
    let detail: Value = app
        .get(&format!("/sales/{}", sale_id))
        .await
        .json()
        .await
        .unwrap();
    let documents = detail["documents"].as_array().unwrap();
    assert_eq!(documents.len(), 2);
    let original = documents
        .iter()
        .find(|d| d["provider_document_id"] == 201)
        .unwrap();
    assert_eq!(original["status"], "final");
}

#[tokio::test]
async fn provider_error_is_surfaced_verbatim() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("100.00", Some("PT123456789"), true).await;

    Mock::given(method("POST"))
        .and(path("/documents"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(provider_error_body("TAX_ID_INVALID", "Tax id is invalid")),
        )
        .mount(&app.provider)
        .await;

    let response = app
        .post(
            &format!("/sales/{}/documents", sale_id),
            &json!({ "document_type": "invoice" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 502);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Tax id is invalid");

    // Nothing was persisted locally.
    let detail: Value = app
        .get(&format!("/sales/{}", sale_id))
        .await
        .json()
        .await
        .unwrap();
    assert!(detail["sale"]["invoice_reference"].is_null());
    assert!(detail["documents"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn email_document_delegates_to_the_provider() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("100.00", Some("PT123456789"), true).await;
    mock_issue(&app, 201, "FT 2026/201").await;

    app.post(
        &format!("/sales/{}/documents", sale_id),
        &json!({ "document_type": "invoice" }),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/documents/201/email"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&app.provider)
        .await;

    let response = app
        .post(
            &format!("/sales/{}/documents/201/email", sale_id),
            &json!({ "document_type": "invoice", "recipient": "billing@acme.example" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("FT 2026/201"));
}
