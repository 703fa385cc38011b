//! Fiscal document provider client.
//!
//! Narrow contract over the external provider: issue, cancel, credit-note,
//! email and fetch. Provider failures are parsed from the error envelope
//! and surfaced verbatim; no local state is touched in here.

use crate::config::ProviderConfig;
use crate::models::{DocumentLine, DocumentStatus, DocumentType};
use chrono::NaiveDate;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

/// Client for the external fiscal document provider API.
#[derive(Clone)]
pub struct FiscalProviderClient {
    client: Client,
    config: ProviderConfig,
}

/// Request to issue a document.
#[derive(Debug, Serialize)]
pub struct IssueDocumentRequest {
    pub document_type: DocumentType,
    pub customer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_tax_id: Option<String>,
    pub date: NaiveDate,
    pub lines: Vec<DocumentLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
}

/// Request to create a credit note compensating an earlier document.
#[derive(Debug, Serialize)]
pub struct CreateCreditNoteRequest {
    pub original_document_id: i64,
    pub original_document_type: DocumentType,
    pub lines: Vec<DocumentLine>,
    pub reason: String,
}

#[derive(Debug, Serialize)]
struct CancelDocumentRequest<'a> {
    document_type: DocumentType,
    reason: &'a str,
}

#[derive(Debug, Serialize)]
struct EmailDocumentRequest<'a> {
    document_type: DocumentType,
    recipient: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Response from document issuance.
#[derive(Debug, Clone, Deserialize)]
pub struct IssuedDocument {
    pub id: i64,
    pub reference: String,
    pub status: DocumentStatus,
    pub pdf_url: Option<String>,
    pub qr_code_url: Option<String>,
}

/// Full document snapshot, as returned by cancel and fetch.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DocumentSnapshot {
    pub id: i64,
    pub reference: String,
    pub document_type: DocumentType,
    pub status: DocumentStatus,
    pub pdf_url: Option<String>,
    pub qr_code_url: Option<String>,
    pub cancellation_reason: Option<String>,
}

/// Provider API error envelope.
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    code: String,
    description: String,
}

impl FiscalProviderClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Check whether provider credentials are set.
    pub fn is_configured(&self) -> bool {
        !self.config.api_base_url.is_empty() && !self.config.api_key.expose_secret().is_empty()
    }

    fn ensure_configured(&self) -> Result<(), AppError> {
        if !self.is_configured() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Fiscal provider credentials not configured"
            )));
        }
        Ok(())
    }

    /// Issue a new document. The resulting reference is persisted onto the
    /// ledger by the caller; on error nothing is persisted.
    pub async fn issue_document(
        &self,
        request: &IssueDocumentRequest,
    ) -> Result<IssuedDocument, AppError> {
        self.ensure_configured()?;

        let url = format!("{}/documents", self.config.api_base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        tracing::debug!(status = %status, body = %body, "Provider issue_document response");

        if status.is_success() {
            let document: IssuedDocument =
                serde_json::from_str(&body).map_err(malformed_response)?;
            tracing::info!(
                document_id = document.id,
                reference = %document.reference,
                document_type = %request.document_type.as_str(),
                "Fiscal document issued"
            );
            Ok(document)
        } else {
            Err(parse_provider_error(&body))
        }
    }

    /// Cancel a document. Requires a non-empty reason; the provider returns
    /// the updated snapshot.
    pub async fn cancel_document(
        &self,
        document_id: i64,
        document_type: DocumentType,
        reason: &str,
    ) -> Result<DocumentSnapshot, AppError> {
        self.ensure_configured()?;

        let url = format!("{}/documents/{}/cancel", self.config.api_base_url, document_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&CancelDocumentRequest {
                document_type,
                reason,
            })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if status.is_success() {
            let snapshot: DocumentSnapshot =
                serde_json::from_str(&body).map_err(malformed_response)?;
            tracing::info!(
                document_id = document_id,
                reference = %snapshot.reference,
                "Fiscal document cancelled"
            );
            Ok(snapshot)
        } else {
            tracing::error!(document_id = document_id, body = %body, "Document cancellation failed");
            Err(parse_provider_error(&body))
        }
    }

    /// Create a credit note referencing an earlier document. The original
    /// document's status is not altered.
    pub async fn create_credit_note(
        &self,
        request: &CreateCreditNoteRequest,
    ) -> Result<IssuedDocument, AppError> {
        self.ensure_configured()?;

        let url = format!("{}/documents/credit-notes", self.config.api_base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if status.is_success() {
            let document: IssuedDocument =
                serde_json::from_str(&body).map_err(malformed_response)?;
            tracing::info!(
                document_id = document.id,
                original_id = request.original_document_id,
                "Credit note created"
            );
            Ok(document)
        } else {
            Err(parse_provider_error(&body))
        }
    }

    /// Ask the provider to send the document to a recipient by email.
    pub async fn send_document_email(
        &self,
        document_id: i64,
        document_type: DocumentType,
        recipient: &str,
        subject: &str,
        body_text: &str,
    ) -> Result<(), AppError> {
        self.ensure_configured()?;

        let url = format!("{}/documents/{}/email", self.config.api_base_url, document_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&EmailDocumentRequest {
                document_type,
                recipient,
                subject,
                body: body_text,
            })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if status.is_success() {
            tracing::info!(document_id = document_id, recipient = %recipient, "Document emailed");
            Ok(())
        } else {
            Err(parse_provider_error(&body))
        }
    }

    /// Fetch the current snapshot of a document. Used by the sync agent and
    /// detail views.
    pub async fn fetch_document(
        &self,
        document_id: i64,
        document_type: DocumentType,
    ) -> Result<DocumentSnapshot, AppError> {
        self.ensure_configured()?;

        let url = format!("{}/documents/{}", self.config.api_base_url, document_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .query(&[("document_type", document_type.as_str())])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if status.is_success() {
            serde_json::from_str(&body).map_err(malformed_response)
        } else {
            Err(parse_provider_error(&body))
        }
    }
}

fn transport_error(err: reqwest::Error) -> AppError {
    AppError::Provider {
        code: "TRANSPORT".to_string(),
        message: err.to_string(),
    }
}

fn malformed_response(err: serde_json::Error) -> AppError {
    AppError::Provider {
        code: "MALFORMED_RESPONSE".to_string(),
        message: err.to_string(),
    }
}

/// Parse the provider's `{error: {code, description}}` envelope, falling
/// back to the raw body so the message is never lost.
fn parse_provider_error(body: &str) -> AppError {
    let parsed: ProviderErrorBody =
        serde_json::from_str(body).unwrap_or_else(|_| ProviderErrorBody {
            error: ProviderErrorDetail {
                code: "UNKNOWN".to_string(),
                description: body.to_string(),
            },
        });
    tracing::error!(
        code = %parsed.error.code,
        description = %parsed.error.description,
        "Provider request failed"
    );
    AppError::Provider {
        code: parsed.error.code,
        message: parsed.error.description,
    }
}
