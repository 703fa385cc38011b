//! Organization context consumed by the fiscal core.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Per-tenant settings: the default tax rate applied to untaxed lines and
/// whether the fiscal provider integration is active for this organization.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrgSettings {
    pub org_id: String,
    pub default_tax_rate: Decimal,
    pub fiscal_provider_enabled: bool,
    pub updated_utc: DateTime<Utc>,
}

impl OrgSettings {
    /// Defaults used when an organization has never been provisioned.
    pub fn defaults(org_id: &str) -> Self {
        Self {
            org_id: org_id.to_string(),
            default_tax_rate: Decimal::new(2300, 2),
            fiscal_provider_enabled: true,
            updated_utc: Utc::now(),
        }
    }
}

/// Input for provisioning organization settings.
#[derive(Debug, Clone)]
pub struct UpdateOrgSettings {
    pub default_tax_rate: Decimal,
    pub fiscal_provider_enabled: bool,
}
