//! Request/response DTOs for the REST surface.
//!
//! Money travels as decimal strings. Structural validation lives here;
//! positivity checks on amounts are done in handlers because `validator`
//! cannot range-check `Decimal`.

use crate::domain::installments::InstallmentPart;
use crate::domain::summary::PaymentSummary;
use crate::models::{
    DocumentType, FiscalDocument, Payment, PaymentMethod, Sale, SaleItem, SaleStatus,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// -----------------------------------------------------------------------------
// Sales
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSaleItemRequest {
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSaleRequest {
    #[validate(length(min = 1, max = 200))]
    pub customer_name: String,
    #[validate(length(max = 30))]
    pub customer_tax_id: Option<String>,
    pub total: Decimal,
    pub notes: Option<String>,
    #[validate(nested)]
    #[serde(default)]
    pub items: Vec<CreateSaleItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSaleStatusRequest {
    pub status: SaleStatus,
}

/// Full sale view: the aggregate, its items, the ledger with its computed
/// summary, and the cached fiscal documents.
#[derive(Debug, Serialize)]
pub struct SaleDetailResponse {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payments: Vec<Payment>,
    pub summary: PaymentSummary,
    pub documents: Vec<FiscalDocument>,
}

// -----------------------------------------------------------------------------
// Payments
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: Option<PaymentMethod>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePaymentRequest {
    pub amount: Option<Decimal>,
    pub payment_date: Option<NaiveDate>,
    pub method: Option<PaymentMethod>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// The ledger plus its derived summary, recomputed on every read.
#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    pub payments: Vec<Payment>,
    pub summary: PaymentSummary,
}

// -----------------------------------------------------------------------------
// Installments
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct InstallmentPreviewRequest {
    #[validate(range(min = 1, max = 4))]
    pub count: u32,
    /// First due date; defaults to today when omitted.
    pub first_due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConfirmInstallmentsRequest {
    #[validate(range(min = 1, max = 4))]
    pub count: u32,
    pub first_due_date: Option<NaiveDate>,
    /// Per-part due date overrides; when present, must carry one date per
    /// installment.
    pub due_dates: Option<Vec<NaiveDate>>,
    pub method: Option<PaymentMethod>,
}

#[derive(Debug, Serialize)]
pub struct InstallmentPlanResponse {
    pub parts: Vec<InstallmentPart>,
    pub total: Decimal,
}

/// Outcome of confirming a plan. Parts are created strictly in order; on a
/// mid-plan failure the already-created payments are kept and reported
/// alongside the failing ordinal.
#[derive(Debug, Serialize)]
pub struct InstallmentOutcomeResponse {
    pub created: Vec<Payment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_ordinal: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// -----------------------------------------------------------------------------
// Fiscal documents
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct IssueDocumentRequest {
    pub document_type: DocumentType,
    /// Required for receipt and invoice-receipt; ignored for sale-level
    /// invoices.
    pub payment_id: Option<Uuid>,
    /// Overrides the computed observations when present.
    #[validate(length(max = 2000))]
    pub observations: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DraftPreviewRequest {
    pub document_type: DocumentType,
    pub payment_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CancelDocumentRequest {
    /// Must match the cached document's type; a mismatch is rejected.
    pub document_type: DocumentType,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreditNoteRequest {
    /// Type of the document being compensated.
    pub document_type: DocumentType,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EmailDocumentRequest {
    pub document_type: DocumentType,
    #[validate(email)]
    pub recipient: String,
    #[validate(length(max = 200))]
    pub subject: Option<String>,
    #[validate(length(max = 5000))]
    pub body: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IssueDocumentResponse {
    pub document: FiscalDocument,
    /// Present when issuance also transitioned a payment to paid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// -----------------------------------------------------------------------------
// Organization settings
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UpdateOrgSettingsRequest {
    pub default_tax_rate: Decimal,
    pub fiscal_provider_enabled: bool,
}
