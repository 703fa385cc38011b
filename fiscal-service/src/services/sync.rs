//! Sync agent: re-fetches provider state for a payment's document and
//! overwrites the local cache with it. The provider is authoritative, so
//! the operation is idempotent and safe to repeat after crashes or missed
//! responses.

use crate::models::DocumentStatus;
use crate::services::provider::{DocumentSnapshot, FiscalProviderClient};
use crate::services::Database;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct SyncAgent {
    db: Database,
    provider: FiscalProviderClient,
}

impl SyncAgent {
    pub fn new(db: Database, provider: FiscalProviderClient) -> Self {
        Self { db, provider }
    }

    /// Refresh one payment's document from the provider.
    ///
    /// Looks up the payment's provider document reference, fetches the
    /// current snapshot, and overwrites both the payment artifacts and the
    /// cached document row. Returns the fresh snapshot.
    #[instrument(skip(self), fields(org_id = %org_id, payment_id = %payment_id))]
    pub async fn sync_payment_document(
        &self,
        org_id: &str,
        sale_id: Uuid,
        payment_id: Uuid,
    ) -> Result<DocumentSnapshot, AppError> {
        let payment = self
            .db
            .get_payment(org_id, sale_id, payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

        let document_id = payment.provider_document_id.ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Payment has no fiscal document to sync"))
        })?;
        let document_type = payment
            .document_type
            .as_deref()
            .map(crate::models::DocumentType::from_string)
            .ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("Payment document type is unknown"))
            })?;

        let snapshot = self.provider.fetch_document(document_id, document_type).await?;

        self.db
            .update_payment_artifacts(
                org_id,
                payment_id,
                snapshot.pdf_url.as_deref(),
                snapshot.qr_code_url.as_deref(),
            )
            .await?;

        // Preserve the cached line items; only provider-owned state is
        // overwritten.
        let cached = self.db.get_fiscal_document(org_id, document_id).await?;
        let items = cached.map(|d| d.lines()).unwrap_or_default();

        self.db
            .upsert_fiscal_document(&crate::models::UpsertFiscalDocument {
                provider_document_id: snapshot.id,
                org_id: org_id.to_string(),
                sale_id,
                payment_id: Some(payment_id),
                document_type: snapshot.document_type,
                reference: snapshot.reference.clone(),
                status: snapshot.status,
                pdf_url: snapshot.pdf_url.clone(),
                qr_code_url: snapshot.qr_code_url.clone(),
                cancellation_reason: snapshot.cancellation_reason.clone(),
                items,
            })
            .await?;

        if snapshot.status == DocumentStatus::Cancelled {
            info!(
                document_id = document_id,
                "Synced document is cancelled on the provider side"
            );
        }

        info!(
            document_id = document_id,
            reference = %snapshot.reference,
            status = %snapshot.status.as_str(),
            "Payment document synced from provider"
        );

        Ok(snapshot)
    }
}
