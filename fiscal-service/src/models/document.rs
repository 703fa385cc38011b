//! Fiscal document models.
//!
//! The provider is authoritative for document state; `FiscalDocument` rows
//! are cached metadata the sync agent may overwrite at any time.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Type of document issued by the fiscal provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Invoice,
    InvoiceReceipt,
    Receipt,
    CreditNote,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice",
            DocumentType::InvoiceReceipt => "invoice_receipt",
            DocumentType::Receipt => "receipt",
            DocumentType::CreditNote => "credit_note",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "invoice_receipt" => DocumentType::InvoiceReceipt,
            "receipt" => DocumentType::Receipt,
            "credit_note" => DocumentType::CreditNote,
            _ => DocumentType::Invoice,
        }
    }
}

/// Provider-side document status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Final,
    Settled,
    Cancelled,
    SecondCopy,
    Sent,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Final => "final",
            DocumentStatus::Settled => "settled",
            DocumentStatus::Cancelled => "cancelled",
            DocumentStatus::SecondCopy => "second_copy",
            DocumentStatus::Sent => "sent",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "draft" => DocumentStatus::Draft,
            "settled" => DocumentStatus::Settled,
            "cancelled" => DocumentStatus::Cancelled,
            "second_copy" => DocumentStatus::SecondCopy,
            "sent" => DocumentStatus::Sent,
            _ => DocumentStatus::Final,
        }
    }

    /// Cancelled is terminal: no further cancellation or credit note is
    /// allowed against the document.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Cancelled)
    }
}

/// One line on a fiscal document, as sent to the provider and as cached
/// locally for later credit-note copying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLine {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<Decimal>,
}

/// Cached snapshot of a provider document.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FiscalDocument {
    pub provider_document_id: i64,
    pub org_id: String,
    pub sale_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub document_type: String,
    pub reference: String,
    pub status: String,
    pub pdf_url: Option<String>,
    pub qr_code_url: Option<String>,
    pub cancellation_reason: Option<String>,
    pub items: serde_json::Value,
    pub issued_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl FiscalDocument {
    pub fn document_type(&self) -> DocumentType {
        DocumentType::from_string(&self.document_type)
    }

    pub fn status(&self) -> DocumentStatus {
        DocumentStatus::from_string(&self.status)
    }

    /// Deserialize the cached line snapshot (used when copying items onto a
    /// credit note).
    pub fn lines(&self) -> Vec<DocumentLine> {
        serde_json::from_value(self.items.clone()).unwrap_or_default()
    }
}

/// Input for inserting or overwriting a cached document row.
#[derive(Debug, Clone)]
pub struct UpsertFiscalDocument {
    pub provider_document_id: i64,
    pub org_id: String,
    pub sale_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub document_type: DocumentType,
    pub reference: String,
    pub status: DocumentStatus,
    pub pdf_url: Option<String>,
    pub qr_code_url: Option<String>,
    pub cancellation_reason: Option<String>,
    pub items: Vec<DocumentLine>,
}
