//! Document sync handler.

use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{middleware::TenantContext, services::provider::DocumentSnapshot, AppState};

/// Re-fetch a payment's document from the provider and overwrite the local
/// cache with the authoritative state. Safe to repeat.
pub async fn sync_payment_document(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path((sale_id, payment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DocumentSnapshot>, AppError> {
    let snapshot = state
        .sync
        .sync_payment_document(&tenant.org_id, sale_id, payment_id)
        .await?;

    Ok(Json(snapshot))
}
