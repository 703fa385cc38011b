//! Payment ledger entry model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Record status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "paid" => PaymentStatus::Paid,
            _ => PaymentStatus::Pending,
        }
    }
}

/// Payment method for a collection event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Mbway,
    Check,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Mbway => "mbway",
            PaymentMethod::Check => "check",
        }
    }
}

/// One collection event or scheduled collection against a sale.
///
/// The fiscal linkage columns are populated once a document covering this
/// payment has been issued; from that point on the entry is protected from
/// deletion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub sale_id: Uuid,
    pub org_id: String,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: Option<String>,
    pub status: String,
    pub document_reference: Option<String>,
    pub provider_document_id: Option<i64>,
    pub document_type: Option<String>,
    pub pdf_url: Option<String>,
    pub qr_code_url: Option<String>,
    pub attachment_url: Option<String>,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Payment {
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::from_string(&self.status)
    }

    pub fn is_pending(&self) -> bool {
        self.status() == PaymentStatus::Pending
    }

    pub fn is_paid(&self) -> bool {
        self.status() == PaymentStatus::Paid
    }

    /// A payment with a fiscal document attached cannot be deleted or have
    /// its amount edited out from under the document.
    pub fn has_fiscal_document(&self) -> bool {
        self.provider_document_id.is_some() || self.document_reference.is_some()
    }
}

/// Input for creating a payment.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub org_id: String,
    pub sale_id: Uuid,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: Option<PaymentMethod>,
    pub notes: Option<String>,
}

/// Input for editing a pending payment.
#[derive(Debug, Clone, Default)]
pub struct UpdatePayment {
    pub amount: Option<Decimal>,
    pub payment_date: Option<NaiveDate>,
    pub method: Option<PaymentMethod>,
    pub notes: Option<String>,
}
