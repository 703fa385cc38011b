//! Sale handlers. All operations are scoped to the tenant from the
//! request context.

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
    dtos::{CreateSaleRequest, SaleDetailResponse, UpdateSaleStatusRequest},
    middleware::TenantContext,
    models::{CreateSale, CreateSaleItem, Sale},
    AppState,
};

/// Create a sale with optional line items.
pub async fn create_sale(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateSaleRequest>,
) -> Result<(StatusCode, Json<Sale>), AppError> {
    payload.validate()?;

    if payload.total <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Sale total must be positive"
        )));
    }
    for item in &payload.items {
        if item.quantity <= Decimal::ZERO || item.unit_price < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Sale item quantities must be positive and prices non-negative"
            )));
        }
    }

    tracing::info!(
        org_id = %tenant.org_id,
        customer = %payload.customer_name,
        total = %payload.total,
        "Creating sale"
    );

    let input = CreateSale {
        org_id: tenant.org_id.clone(),
        customer_name: payload.customer_name,
        customer_tax_id: payload.customer_tax_id,
        total: payload.total,
        notes: payload.notes,
        items: payload
            .items
            .into_iter()
            .enumerate()
            .map(|(i, item)| CreateSaleItem {
                description: item.description,
                quantity: item.quantity,
                unit_price: item.unit_price,
                tax_rate: item.tax_rate,
                sort_order: i as i32,
            })
            .collect(),
    };

    let sale = state.db.create_sale(&input).await?;

    Ok((StatusCode::CREATED, Json(sale)))
}

/// Get a sale with its items, ledger, summary and cached documents.
pub async fn get_sale(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sale_id): Path<Uuid>,
) -> Result<Json<SaleDetailResponse>, AppError> {
    let sale = state
        .db
        .get_sale(&tenant.org_id, sale_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Sale not found")))?;

    let items = state.db.list_sale_items(&tenant.org_id, sale_id).await?;
    let payments = state.db.list_payments(&tenant.org_id, sale_id).await?;
    let documents = state.db.list_sale_documents(&tenant.org_id, sale_id).await?;
    let summary = PaymentSummary::compute(&payments, sale.total);

    Ok(Json(SaleDetailResponse {
        sale,
        items,
        payments,
        summary,
        documents,
    }))
}

/// Update a sale's lifecycle status.
pub async fn update_sale_status(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sale_id): Path<Uuid>,
    Json(payload): Json<UpdateSaleStatusRequest>,
) -> Result<Json<Sale>, AppError> {
    tracing::info!(
        org_id = %tenant.org_id,
        sale_id = %sale_id,
        new_status = ?payload.status,
        "Updating sale status"
    );

    let sale = state
        .db
        .update_sale_status(&tenant.org_id, sale_id, payload.status)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Sale not found")))?;

    Ok(Json(sale))
}
