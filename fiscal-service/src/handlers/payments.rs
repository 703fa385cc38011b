//! Payment ledger handlers.
//!
//! The ledger is append-mostly: pending entries may be edited or deleted,
//! paid and fiscally-covered entries may not.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::summary::PaymentSummary,
    dtos::{CreatePaymentRequest, LedgerResponse, UpdatePaymentRequest},
    middleware::TenantContext,
    models::{CreatePayment, Payment, Sale, UpdatePayment},
    services::metrics::PAYMENTS_CREATED_TOTAL,
    AppState,
};

async fn load_sale(state: &AppState, org_id: &str, sale_id: Uuid) -> Result<Sale, AppError> {
    state
        .db
        .get_sale(org_id, sale_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Sale not found")))
}

async fn load_payment(
    state: &AppState,
    org_id: &str,
    sale_id: Uuid,
    payment_id: Uuid,
) -> Result<Payment, AppError> {
    state
        .db
        .get_payment(org_id, sale_id, payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))
}

/// List the ledger for a sale with its computed summary.
pub async fn list_payments(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sale_id): Path<Uuid>,
) -> Result<Json<LedgerResponse>, AppError> {
    let sale = load_sale(&state, &tenant.org_id, sale_id).await?;
    let payments = state.db.list_payments(&tenant.org_id, sale_id).await?;
    let summary = PaymentSummary::compute(&payments, sale.total);

    Ok(Json(LedgerResponse { payments, summary }))
}

/// Schedule or record a payment against a sale.
pub async fn create_payment(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sale_id): Path<Uuid>,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    payload.validate()?;

    if payload.amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Payment amount must be positive"
        )));
    }

    let sale = load_sale(&state, &tenant.org_id, sale_id).await?;
    let payments = state.db.list_payments(&tenant.org_id, sale_id).await?;
    let summary = PaymentSummary::compute(&payments, sale.total);

    if payload.amount > summary.remaining_to_schedule {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Amount {} exceeds the {} still unallocated on this sale",
            payload.amount,
            summary.remaining_to_schedule
        )));
    }

    tracing::info!(
        org_id = %tenant.org_id,
        sale_id = %sale_id,
        amount = %payload.amount,
        "Creating payment"
    );

    let payment = state
        .db
        .create_payment(&CreatePayment {
            org_id: tenant.org_id.clone(),
            sale_id,
            amount: payload.amount,
            payment_date: payload.payment_date,
            method: payload.method,
            notes: payload.notes,
        })
        .await?;

    PAYMENTS_CREATED_TOTAL.with_label_values(&["manual"]).inc();

    Ok((StatusCode::CREATED, Json(payment)))
}

/// Edit a pending payment. Paid payments are immutable.
pub async fn update_payment(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path((sale_id, payment_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdatePaymentRequest>,
) -> Result<Json<Payment>, AppError> {
    payload.validate()?;

    if let Some(amount) = payload.amount {
        if amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be positive"
            )));
        }
    }

    let existing = load_payment(&state, &tenant.org_id, sale_id, payment_id).await?;
    if !existing.is_pending() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Only pending payments can be edited"
        )));
    }

    let payment = state
        .db
        .update_payment(
            &tenant.org_id,
            sale_id,
            payment_id,
            &UpdatePayment {
                amount: payload.amount,
                payment_date: payload.payment_date,
                method: payload.method,
                notes: payload.notes,
            },
        )
        .await?
        // Raced with a status transition: the row stopped being pending.
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!("Only pending payments can be edited"))
        })?;

    Ok(Json(payment))
}

/// Mark a pending payment as collected. Idempotent on repeats.
pub async fn mark_payment_paid(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path((sale_id, payment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Payment>, AppError> {
    load_payment(&state, &tenant.org_id, sale_id, payment_id).await?;

    tracing::info!(
        org_id = %tenant.org_id,
        payment_id = %payment_id,
        "Marking payment paid"
    );

    let payment = state
        .db
        .mark_payment_paid(&tenant.org_id, sale_id, payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

    Ok(Json(payment))
}

/// Delete a payment. Refused once it is paid, covered by a fiscal document,
/// or the sale has reached a terminal status.
pub async fn delete_payment(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path((sale_id, payment_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let sale = load_sale(&state, &tenant.org_id, sale_id).await?;
    let payment = load_payment(&state, &tenant.org_id, sale_id, payment_id).await?;

    if payment.is_paid() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Paid payments cannot be deleted"
        )));
    }
    if payment.has_fiscal_document() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Payment is covered by fiscal document {}",
            payment.document_reference.as_deref().unwrap_or("unknown")
        )));
    }
    if sale.status().is_terminal() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Payments on a {} sale cannot be deleted",
            sale.status
        )));
    }

    let deleted = state
        .db
        .delete_payment(&tenant.org_id, sale_id, payment_id)
        .await?;
    if deleted == 0 {
        return Err(AppError::NotFound(anyhow::anyhow!("Payment not found")));
    }

    tracing::info!(
        org_id = %tenant.org_id,
        payment_id = %payment_id,
        "Payment deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}
