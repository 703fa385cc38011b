//! Sale aggregate model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Sale status. Delivered and cancelled are terminal: once a sale reaches
/// either, its payment ledger no longer accepts deletions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Open,
    Delivered,
    Cancelled,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Open => "open",
            SaleStatus::Delivered => "delivered",
            SaleStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "delivered" => SaleStatus::Delivered,
            "cancelled" => SaleStatus::Cancelled,
            _ => SaleStatus::Open,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SaleStatus::Delivered | SaleStatus::Cancelled)
    }
}

/// Sale aggregate root. Owns zero-or-more payments; optionally linked to a
/// sale-level invoice issued by the fiscal provider.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Sale {
    pub sale_id: Uuid,
    pub org_id: String,
    pub customer_name: String,
    pub customer_tax_id: Option<String>,
    pub total: Decimal,
    pub status: String,
    pub invoice_provider_id: Option<i64>,
    pub invoice_reference: Option<String>,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Sale {
    pub fn status(&self) -> SaleStatus {
        SaleStatus::from_string(&self.status)
    }

    /// Whether a sale-level invoice has been issued and is still in force.
    pub fn has_invoice(&self) -> bool {
        self.invoice_provider_id.is_some()
    }

    /// Whether the customer carries a usable tax identifier.
    pub fn has_tax_id(&self) -> bool {
        self.customer_tax_id
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Line item on a sale.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SaleItem {
    pub sale_item_id: Uuid,
    pub sale_id: Uuid,
    pub org_id: String,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Option<Decimal>,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a sale.
#[derive(Debug, Clone)]
pub struct CreateSale {
    pub org_id: String,
    pub customer_name: String,
    pub customer_tax_id: Option<String>,
    pub total: Decimal,
    pub notes: Option<String>,
    pub items: Vec<CreateSaleItem>,
}

/// Input for creating a sale line item.
#[derive(Debug, Clone)]
pub struct CreateSaleItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Option<Decimal>,
    pub sort_order: i32,
}
