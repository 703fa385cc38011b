//! Installment planning handlers.
//!
//! Preview is a pure calculation over the current ledger; confirmation
//! materializes the plan into pending payments, strictly in order.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{
        installments::{InstallmentPlan, MaterializeOutcome, PlanError},
        summary::PaymentSummary,
    },
    dtos::{ConfirmInstallmentsRequest, InstallmentOutcomeResponse, InstallmentPlanResponse, InstallmentPreviewRequest},
    middleware::TenantContext,
    models::CreatePayment,
    services::metrics::PAYMENTS_CREATED_TOTAL,
    AppState,
};

fn plan_error(err: PlanError) -> AppError {
    match err {
        PlanError::NonPositiveAmount => AppError::Conflict(anyhow::anyhow!(
            "Nothing remains to schedule on this sale"
        )),
        other => AppError::BadRequest(anyhow::Error::new(other)),
    }
}

async fn build_plan(
    state: &AppState,
    org_id: &str,
    sale_id: Uuid,
    count: u32,
    first_due_date: Option<chrono::NaiveDate>,
) -> Result<InstallmentPlan, AppError> {
    let sale = state
        .db
        .get_sale(org_id, sale_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Sale not found")))?;
    let payments = state.db.list_payments(org_id, sale_id).await?;
    let summary = PaymentSummary::compute(&payments, sale.total);

    let first_due = first_due_date.unwrap_or_else(|| Utc::now().date_naive());
    InstallmentPlan::split(summary.remaining_to_schedule, count, first_due).map_err(plan_error)
}

/// Preview splitting the unallocated balance into N dated parts. Nothing is
/// persisted.
pub async fn preview_installments(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sale_id): Path<Uuid>,
    Json(payload): Json<InstallmentPreviewRequest>,
) -> Result<Json<InstallmentPlanResponse>, AppError> {
    payload.validate()?;

    let plan = build_plan(
        &state,
        &tenant.org_id,
        sale_id,
        payload.count,
        payload.first_due_date,
    )
    .await?;

    Ok(Json(InstallmentPlanResponse {
        total: plan.total(),
        parts: plan.parts().to_vec(),
    }))
}

/// Confirm a plan: create one pending payment per part, in order.
///
/// On a mid-plan failure the payments already created are kept; the response
/// reports them with the failing ordinal under 207 Multi-Status so the
/// caller can retry the remainder.
pub async fn confirm_installments(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sale_id): Path<Uuid>,
    Json(payload): Json<ConfirmInstallmentsRequest>,
) -> Result<(StatusCode, Json<InstallmentOutcomeResponse>), AppError> {
    payload.validate()?;

    if let Some(dates) = &payload.due_dates {
        if dates.len() != payload.count as usize {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Expected {} due dates, got {}",
                payload.count,
                dates.len()
            )));
        }
    }

    let mut plan = build_plan(
        &state,
        &tenant.org_id,
        sale_id,
        payload.count,
        payload.first_due_date,
    )
    .await?;

    if let Some(dates) = &payload.due_dates {
        for (index, date) in dates.iter().enumerate() {
            plan = plan.with_date(index, *date).map_err(plan_error)?;
        }
    }

    tracing::info!(
        org_id = %tenant.org_id,
        sale_id = %sale_id,
        count = payload.count,
        total = %plan.total(),
        "Confirming installment plan"
    );

    let outcome = plan
        .materialize(|part| {
            let db = state.db.clone();
            let org_id = tenant.org_id.clone();
            let method = payload.method;
            async move {
                db.create_payment(&CreatePayment {
                    org_id,
                    sale_id,
                    amount: part.amount,
                    payment_date: part.due_date,
                    method,
                    notes: Some(part.label()),
                })
                .await
            }
        })
        .await;

    match outcome {
        MaterializeOutcome::Complete(created) => {
            PAYMENTS_CREATED_TOTAL
                .with_label_values(&["installment"])
                .inc_by(created.len() as f64);
            Ok((
                StatusCode::CREATED,
                Json(InstallmentOutcomeResponse {
                    created,
                    failed_ordinal: None,
                    error: None,
                }),
            ))
        }
        MaterializeOutcome::Partial {
            created,
            failed_ordinal,
            error,
        } => {
            PAYMENTS_CREATED_TOTAL
                .with_label_values(&["installment"])
                .inc_by(created.len() as f64);
            tracing::error!(
                org_id = %tenant.org_id,
                sale_id = %sale_id,
                ordinal = failed_ordinal,
                error = %error,
                "Installment creation failed mid-plan; keeping earlier parts"
            );
            Ok((
                StatusCode::MULTI_STATUS,
                Json(InstallmentOutcomeResponse {
                    created,
                    failed_ordinal: Some(failed_ordinal),
                    error: Some(error.to_string()),
                }),
            ))
        }
    }
}
