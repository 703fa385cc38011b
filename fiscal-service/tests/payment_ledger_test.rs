//! Payment ledger integration tests: creation guards, summary figures, and
//! edit/delete protections.

mod common;

use common::TestApp;
use serde_json::{json, Value};

#[tokio::test]
async fn create_sale_returns_created_sale() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/sales",
            &json!({
                "customer_name": "Acme Lda",
                "customer_tax_id": "PT123456789",
                "total": "1000.00",
                "items": [
                    { "description": "Sofa", "quantity": "2", "unit_price": "400.00" },
                    { "description": "Delivery", "quantity": "1", "unit_price": "200.00", "tax_rate": "6.00" }
                ]
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 201);
    let sale: Value = response.json().await.unwrap();
    assert_eq!(sale["customer_name"], "Acme Lda");
    assert_eq!(sale["total"], "1000.00");
    assert_eq!(sale["status"], "open");
}

#[tokio::test]
async fn request_without_org_header_is_rejected() {
    let app = TestApp::spawn().await;

    let response = reqwest::Client::new()
        .post(format!("{}/sales", app.address))
        .json(&json!({ "customer_name": "Acme", "total": "10.00" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn sales_are_isolated_between_organizations() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("100.00", None, false).await;

    let response = reqwest::Client::new()
        .get(format!("{}/sales/{}", app.address, sale_id))
        .header(common::ORG_HEADER, "some_other_org")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn ledger_summary_tracks_paid_and_pending() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("1000.00", None, false).await;

    let payment_id = app.create_payment(&sale_id, "400.00", "2026-01-10").await;
    app.post(
        &format!("/sales/{}/payments/{}/mark-paid", sale_id, payment_id),
        &json!({}),
    )
    .await;
    app.create_payment(&sale_id, "600.00", "2026-02-10").await;

    let ledger: Value = app
        .get(&format!("/sales/{}/payments", sale_id))
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(ledger["payments"].as_array().unwrap().len(), 2);
    assert_eq!(ledger["summary"]["paid"], "400.00");
    assert_eq!(ledger["summary"]["pending_scheduled"], "600.00");
    assert_eq!(ledger["summary"]["remaining"], "600.00");
    assert_eq!(ledger["summary"]["remaining_to_schedule"], "0.00");
}

#[tokio::test]
async fn payment_exceeding_unallocated_balance_is_rejected() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("100.00", None, false).await;
    app.create_payment(&sale_id, "60.00", "2026-01-10").await;

    let response = app
        .post(
            &format!("/sales/{}/payments", sale_id),
            &json!({ "amount": "50.00", "payment_date": "2026-02-10" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn non_positive_payment_amount_is_rejected() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("100.00", None, false).await;

    for amount in ["0.00", "-5.00"] {
        let response = app
            .post(
                &format!("/sales/{}/payments", sale_id),
                &json!({ "amount": amount, "payment_date": "2026-01-10" }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 400, "amount = {amount}");
    }
}

#[tokio::test]
async fn pending_payment_is_editable_paid_is_not() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("500.00", None, false).await;
    let payment_id = app.create_payment(&sale_id, "200.00", "2026-01-10").await;

    let response = app
        .patch(
            &format!("/sales/{}/payments/{}", sale_id, payment_id),
            &json!({ "amount": "250.00", "method": "mbway" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["amount"], "250.00");
    assert_eq!(updated["method"], "mbway");

    app.post(
        &format!("/sales/{}/payments/{}/mark-paid", sale_id, payment_id),
        &json!({}),
    )
    .await;

    let response = app
        .patch(
            &format!("/sales/{}/payments/{}", sale_id, payment_id),
            &json!({ "amount": "300.00" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn paid_payment_cannot_be_deleted_pending_can() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("500.00", None, false).await;

    let paid_id = app.create_payment(&sale_id, "200.00", "2026-01-10").await;
    app.post(
        &format!("/sales/{}/payments/{}/mark-paid", sale_id, paid_id),
        &json!({}),
    )
    .await;
    let pending_id = app.create_payment(&sale_id, "100.00", "2026-02-10").await;

    let response = app
        .delete(&format!("/sales/{}/payments/{}", sale_id, paid_id))
        .await;
    assert_eq!(response.status().as_u16(), 409);

    let response = app
        .delete(&format!("/sales/{}/payments/{}", sale_id, pending_id))
        .await;
    assert_eq!(response.status().as_u16(), 204);
}

#[tokio::test]
async fn delivered_sale_locks_payment_deletion() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("500.00", None, false).await;
    let payment_id = app.create_payment(&sale_id, "100.00", "2026-01-10").await;

    let response = app
        .patch(
            &format!("/sales/{}/status", sale_id),
            &json!({ "status": "delivered" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .delete(&format!("/sales/{}/payments/{}", sale_id, payment_id))
        .await;
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn deleting_pending_payment_frees_its_allocation() {
    let app = TestApp::spawn().await;
    let sale_id = app.create_sale("100.00", None, false).await;
    let payment_id = app.create_payment(&sale_id, "100.00", "2026-01-10").await;

    app.delete(&format!("/sales/{}/payments/{}", sale_id, payment_id))
        .await;

    // The full amount is schedulable again.
    let response = app
        .post(
            &format!("/sales/{}/payments", sale_id),
            &json!({ "amount": "100.00", "payment_date": "2026-03-01" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
}
