//! Organization settings handlers.

use axum::{
    extract::State,
    Json,
};
use rust_decimal::Decimal;
use service_core::error::AppError;

use crate::{
    dtos::UpdateOrgSettingsRequest,
    middleware::TenantContext,
    models::{OrgSettings, UpdateOrgSettings},
    AppState,
};

/// Get the tenant's settings (defaults when never provisioned).
pub async fn get_settings(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<OrgSettings>, AppError> {
    let settings = state.db.get_org_settings(&tenant.org_id).await?;
    Ok(Json(settings))
}

/// Provision or update the tenant's settings.
pub async fn update_settings(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<UpdateOrgSettingsRequest>,
) -> Result<Json<OrgSettings>, AppError> {
    if payload.default_tax_rate < Decimal::ZERO || payload.default_tax_rate > Decimal::ONE_HUNDRED {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Default tax rate must be between 0 and 100"
        )));
    }

    tracing::info!(
        org_id = %tenant.org_id,
        default_tax_rate = %payload.default_tax_rate,
        fiscal_provider_enabled = payload.fiscal_provider_enabled,
        "Updating organization settings"
    );

    let settings = state
        .db
        .upsert_org_settings(
            &tenant.org_id,
            &UpdateOrgSettings {
                default_tax_rate: payload.default_tax_rate,
                fiscal_provider_enabled: payload.fiscal_provider_enabled,
            },
        )
        .await?;

    Ok(Json(settings))
}
