//! Fiscal document lifecycle handlers: draft preview, issuance,
//! cancellation, credit notes and email delivery.
//!
//! Preconditions run before any provider call; local state is only written
//! after the provider accepts the operation.

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
    domain::documents::{
        ensure_can_cancel, ensure_can_credit_note, ensure_can_issue_invoice,
        ensure_can_issue_invoice_receipt, ensure_can_issue_receipt, DraftPreview,
    },
    dtos::{
        CancelDocumentRequest, CreditNoteRequest, DraftPreviewRequest, EmailDocumentRequest,
        IssueDocumentRequest, IssueDocumentResponse, MessageResponse,
    },
    middleware::TenantContext,
    models::{DocumentType, FiscalDocument, OrgSettings, Payment, Sale, UpsertFiscalDocument},
    services::metrics::{DOCUMENTS_CANCELLED_TOTAL, DOCUMENTS_ISSUED_TOTAL},
    services::provider::{self, CreateCreditNoteRequest},
    AppState,
};

struct SaleContext {
    sale: Sale,
    settings: OrgSettings,
}

async fn load_context(
    state: &AppState,
    org_id: &str,
    sale_id: Uuid,
) -> Result<SaleContext, AppError> {
    let sale = state
        .db
        .get_sale(org_id, sale_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Sale not found")))?;
    let settings = state.db.get_org_settings(org_id).await?;
    Ok(SaleContext { sale, settings })
}

async fn load_payment(
    state: &AppState,
    org_id: &str,
    sale_id: Uuid,
    payment_id: Option<Uuid>,
) -> Result<Payment, AppError> {
    let payment_id = payment_id.ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!(
            "payment_id is required for this document type"
        ))
    })?;
    state
        .db
        .get_payment(org_id, sale_id, payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))
}

async fn load_owned_document(
    state: &AppState,
    org_id: &str,
    sale_id: Uuid,
    document_id: i64,
) -> Result<FiscalDocument, AppError> {
    let document = state
        .db
        .get_fiscal_document(org_id, document_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Document not found")))?;
    if document.sale_id != sale_id {
        return Err(AppError::NotFound(anyhow::anyhow!("Document not found")));
    }
    Ok(document)
}

/// The caller names the document type it believes it is acting on; a
/// mismatch with the cached row means the request targets the wrong
/// document.
fn ensure_type_matches(
    document: &FiscalDocument,
    requested: DocumentType,
) -> Result<(), AppError> {
    if document.document_type() != requested {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Document {} is a {}, not a {}",
            document.reference,
            document.document_type().as_str(),
            requested.as_str()
        )));
    }
    Ok(())
}

/// Build the draft for a document without touching the provider.
async fn build_draft(
    state: &AppState,
    org_id: &str,
    sale_id: Uuid,
    document_type: DocumentType,
    payment_id: Option<Uuid>,
) -> Result<(DraftPreview, SaleContext, Option<Payment>), AppError> {
    let ctx = load_context(state, org_id, sale_id).await?;
    let items = state.db.list_sale_items(org_id, sale_id).await?;
    let payments = state.db.list_payments(org_id, sale_id).await?;
    let rate = ctx.settings.default_tax_rate;

    match document_type {
        DocumentType::Invoice => {
            ensure_can_issue_invoice(&ctx.sale, &ctx.settings)?;
            let preview = DraftPreview::for_invoice(&items, &payments, rate);
            Ok((preview, ctx, None))
        }
        DocumentType::InvoiceReceipt => {
            let payment = load_payment(state, org_id, sale_id, payment_id).await?;
            ensure_can_issue_invoice_receipt(&ctx.sale, &ctx.settings, &payment)?;
            let preview = DraftPreview::for_invoice_receipt(&items, &payment, payments.len(), rate);
            Ok((preview, ctx, Some(payment)))
        }
        DocumentType::Receipt => {
            let payment = load_payment(state, org_id, sale_id, payment_id).await?;
            ensure_can_issue_receipt(&ctx.sale, &ctx.settings, &payment)?;
            let preview = DraftPreview::for_receipt(&payment, rate);
            Ok((preview, ctx, Some(payment)))
        }
        DocumentType::CreditNote => Err(AppError::BadRequest(anyhow::anyhow!(
            "Credit notes are issued against an existing document"
        ))),
    }
}

/// Preview the draft that issuance would submit.
pub async fn preview_document(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sale_id): Path<Uuid>,
    Json(payload): Json<DraftPreviewRequest>,
) -> Result<Json<DraftPreview>, AppError> {
    let (preview, _, _) = build_draft(
        &state,
        &tenant.org_id,
        sale_id,
        payload.document_type,
        payload.payment_id,
    )
    .await?;
    Ok(Json(preview))
}

/// Issue a document through the provider and persist the linkage.
pub async fn issue_document(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sale_id): Path<Uuid>,
    Json(payload): Json<IssueDocumentRequest>,
) -> Result<(StatusCode, Json<IssueDocumentResponse>), AppError> {
    payload.validate()?;

    let document_type = payload.document_type;
    let (preview, ctx, payment) = build_draft(
        &state,
        &tenant.org_id,
        sale_id,
        document_type,
        payload.payment_id,
    )
    .await?;

    let observations = payload
        .observations
        .or_else(|| (!preview.observations.is_empty()).then(|| preview.observations.clone()));
    let date = payment
        .as_ref()
        .map(|p| p.payment_date)
        .unwrap_or_else(|| Utc::now().date_naive());

    tracing::info!(
        org_id = %tenant.org_id,
        sale_id = %sale_id,
        document_type = %document_type.as_str(),
        total = %preview.total,
        "Issuing fiscal document"
    );

    let issued = state
        .provider
        .issue_document(&provider::IssueDocumentRequest {
            document_type,
            customer_name: ctx.sale.customer_name.clone(),
            customer_tax_id: ctx.sale.customer_tax_id.clone(),
            date,
            lines: preview.lines.clone(),
            observations,
        })
        .await?;

    let updated_payment = match (&payment, document_type) {
        (Some(p), DocumentType::InvoiceReceipt | DocumentType::Receipt) => {
            state
                .db
                .set_payment_document(
                    &tenant.org_id,
                    p.payment_id,
                    &issued.reference,
                    issued.id,
                    document_type.as_str(),
                    issued.pdf_url.as_deref(),
                    issued.qr_code_url.as_deref(),
                )
                .await?;
            // A receipt-type document attests collection.
            state
                .db
                .mark_payment_paid(&tenant.org_id, sale_id, p.payment_id)
                .await?
        }
        _ => {
            state
                .db
                .set_sale_invoice(&tenant.org_id, sale_id, issued.id, &issued.reference)
                .await?;
            None
        }
    };

    let document = state
        .db
        .upsert_fiscal_document(&UpsertFiscalDocument {
            provider_document_id: issued.id,
            org_id: tenant.org_id.clone(),
            sale_id,
            payment_id: payment.as_ref().map(|p| p.payment_id),
            document_type,
            reference: issued.reference.clone(),
            status: issued.status,
            pdf_url: issued.pdf_url.clone(),
            qr_code_url: issued.qr_code_url.clone(),
            cancellation_reason: None,
            items: preview.lines,
        })
        .await?;

    DOCUMENTS_ISSUED_TOTAL
        .with_label_values(&[document_type.as_str()])
        .inc();

    Ok((
        StatusCode::CREATED,
        Json(IssueDocumentResponse {
            document,
            payment: updated_payment,
        }),
    ))
}

/// Cancel a document on the provider side and mirror the result locally.
pub async fn cancel_document(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path((sale_id, document_id)): Path<(Uuid, i64)>,
    Json(payload): Json<CancelDocumentRequest>,
) -> Result<Json<FiscalDocument>, AppError> {
    payload.validate()?;

    let document = load_owned_document(&state, &tenant.org_id, sale_id, document_id).await?;
    ensure_type_matches(&document, payload.document_type)?;
    ensure_can_cancel(&document, &payload.reason)?;

    let snapshot = state
        .provider
        .cancel_document(document_id, document.document_type(), &payload.reason)
        .await?;

    let updated = state
        .db
        .upsert_fiscal_document(&UpsertFiscalDocument {
            provider_document_id: snapshot.id,
            org_id: tenant.org_id.clone(),
            sale_id,
            payment_id: document.payment_id,
            document_type: snapshot.document_type,
            reference: snapshot.reference.clone(),
            status: snapshot.status,
            pdf_url: snapshot.pdf_url.clone(),
            qr_code_url: snapshot.qr_code_url.clone(),
            cancellation_reason: snapshot.cancellation_reason.clone(),
            items: document.lines(),
        })
        .await?;

    // Cancelling the sale-level invoice re-gates receipt issuance.
    let sale = state.db.get_sale(&tenant.org_id, sale_id).await?;
    if let Some(sale) = sale {
        if sale.invoice_provider_id == Some(document_id) {
            state.db.clear_sale_invoice(&tenant.org_id, sale_id).await?;
        }
    }

    DOCUMENTS_CANCELLED_TOTAL
        .with_label_values(&[updated.document_type.as_str()])
        .inc();

    tracing::info!(
        org_id = %tenant.org_id,
        document_id = document_id,
        reference = %updated.reference,
        "Document cancelled"
    );

    Ok(Json(updated))
}

/// Create a credit note compensating an existing document. The original is
/// left untouched.
pub async fn create_credit_note(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path((sale_id, document_id)): Path<(Uuid, i64)>,
    Json(payload): Json<CreditNoteRequest>,
) -> Result<(StatusCode, Json<FiscalDocument>), AppError> {
    payload.validate()?;

    let original = load_owned_document(&state, &tenant.org_id, sale_id, document_id).await?;
    ensure_type_matches(&original, payload.document_type)?;
    ensure_can_credit_note(&original, &payload.reason)?;

    let lines = original.lines();
    if lines.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Document {} has no cached lines to credit",
            original.reference
        )));
    }

    let issued = state
        .provider
        .create_credit_note(&CreateCreditNoteRequest {
            original_document_id: document_id,
            original_document_type: original.document_type(),
            lines: lines.clone(),
            reason: payload.reason.clone(),
        })
        .await?;

    let credit_note = state
        .db
        .upsert_fiscal_document(&UpsertFiscalDocument {
            provider_document_id: issued.id,
            org_id: tenant.org_id.clone(),
            sale_id,
            payment_id: None,
            document_type: DocumentType::CreditNote,
            reference: issued.reference.clone(),
            status: issued.status,
            pdf_url: issued.pdf_url.clone(),
            qr_code_url: issued.qr_code_url.clone(),
            cancellation_reason: None,
            items: lines,
        })
        .await?;

    DOCUMENTS_ISSUED_TOTAL
        .with_label_values(&[DocumentType::CreditNote.as_str()])
        .inc();

    tracing::info!(
        org_id = %tenant.org_id,
        original_id = document_id,
        credit_note = %credit_note.reference,
        "Credit note created"
    );

    Ok((StatusCode::CREATED, Json(credit_note)))
}

/// Ask the provider to email the document to a recipient.
pub async fn email_document(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path((sale_id, document_id)): Path<(Uuid, i64)>,
    Json(payload): Json<EmailDocumentRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    payload.validate()?;

    let document = load_owned_document(&state, &tenant.org_id, sale_id, document_id).await?;
    ensure_type_matches(&document, payload.document_type)?;

    let subject = payload
        .subject
        .unwrap_or_else(|| format!("Document {}", document.reference));
    let body = payload
        .body
        .unwrap_or_else(|| format!("Please find document {} attached.", document.reference));

    state
        .provider
        .send_document_email(
            document_id,
            document.document_type(),
            &payload.recipient,
            &subject,
            &body,
        )
        .await?;

    Ok(Json(MessageResponse {
        message: format!("Document {} sent to {}", document.reference, payload.recipient),
    }))
}
