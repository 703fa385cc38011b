//! Tenant context extraction.
//!
//! Every request must carry `X-Org-ID`; all persistence is scoped by it.
//! `X-User-ID` is optional and only feeds audit logging.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

pub const ORG_ID_HEADER: &str = "x-org-id";
pub const USER_ID_HEADER: &str = "x-user-id";

/// Identity of the calling tenant, extracted from request headers.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub org_id: String,
    pub user_id: Option<String>,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let org_id = parts
            .headers
            .get(ORG_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("Missing X-Org-ID header"))
            })?
            .to_string();

        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);

        Ok(TenantContext { org_id, user_id })
    }
}
