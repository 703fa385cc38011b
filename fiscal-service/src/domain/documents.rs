//! Issuance preconditions and the draft review step.
//!
//! All checks run before any provider call so invalid requests fail closed
//! without touching the network or the ledger.

use crate::models::{DocumentLine, FiscalDocument, OrgSettings, Payment, Sale, SaleItem};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use service_core::error::AppError;

const HUNDRED: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

fn ensure_provider_enabled(settings: &OrgSettings) -> Result<(), AppError> {
    if !settings.fiscal_provider_enabled {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Fiscal provider integration is not active for this organization"
        )));
    }
    Ok(())
}

fn ensure_payment_uncovered(payment: &Payment) -> Result<(), AppError> {
    if payment.has_fiscal_document() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Payment already has a fiscal document ({})",
            payment.document_reference.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(())
}

/// Invoice covers the sale's full total; requires a customer tax identifier.
pub fn ensure_can_issue_invoice(sale: &Sale, settings: &OrgSettings) -> Result<(), AppError> {
    ensure_provider_enabled(settings)?;
    if !sale.has_tax_id() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Cannot issue an invoice: customer has no tax identifier"
        )));
    }
    if sale.has_invoice() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Sale already has invoice {}",
            sale.invoice_reference.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(())
}

/// Invoice-receipt covers exactly one payment's amount; same tax-id rule.
pub fn ensure_can_issue_invoice_receipt(
    sale: &Sale,
    settings: &OrgSettings,
    payment: &Payment,
) -> Result<(), AppError> {
    ensure_provider_enabled(settings)?;
    if !sale.has_tax_id() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Cannot issue an invoice-receipt: customer has no tax identifier"
        )));
    }
    ensure_payment_uncovered(payment)
}

/// Receipt covers one payment and is only available once the sale carries
/// an invoice-type document.
pub fn ensure_can_issue_receipt(
    sale: &Sale,
    settings: &OrgSettings,
    payment: &Payment,
) -> Result<(), AppError> {
    ensure_provider_enabled(settings)?;
    if !sale.has_invoice() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Cannot issue a receipt: the sale has no invoice yet"
        )));
    }
    ensure_payment_uncovered(payment)
}

fn ensure_reason(reason: &str) -> Result<(), AppError> {
    if reason.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "A reason is required"
        )));
    }
    Ok(())
}

/// Cancellation is a one-way transition: a cancelled document cannot be
/// cancelled again.
pub fn ensure_can_cancel(document: &FiscalDocument, reason: &str) -> Result<(), AppError> {
    ensure_reason(reason)?;
    if document.status().is_terminal() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Document {} is already cancelled",
            document.reference
        )));
    }
    Ok(())
}

/// A credit note compensates an existing document without altering it, but
/// is disallowed once the original is cancelled.
pub fn ensure_can_credit_note(document: &FiscalDocument, reason: &str) -> Result<(), AppError> {
    ensure_reason(reason)?;
    if document.status().is_terminal() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Cannot credit-note cancelled document {}",
            document.reference
        )));
    }
    Ok(())
}

/// Computed preview shown to the caller before submission: lines, totals
/// and editable observations.
#[derive(Debug, Clone, Serialize)]
pub struct DraftPreview {
    pub lines: Vec<DocumentLine>,
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub observations: String,
}

fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Sale items are net-priced: tax is added on top of quantity * unit price,
/// using each item's configured rate or the organization default.
fn totals_from_items(items: &[SaleItem], default_rate: Decimal) -> (Vec<DocumentLine>, Decimal, Decimal) {
    let mut subtotal = Decimal::ZERO;
    let mut tax_total = Decimal::ZERO;
    let mut lines = Vec::with_capacity(items.len());

    for item in items {
        let rate = item.tax_rate.unwrap_or(default_rate);
        let line_subtotal = round_cents(item.quantity * item.unit_price);
        let line_tax = round_cents(line_subtotal * rate / HUNDRED);
        subtotal += line_subtotal;
        tax_total += line_tax;
        lines.push(DocumentLine {
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            tax_rate: Some(rate),
        });
    }

    (lines, subtotal, tax_total)
}

/// A direct-amount document is priced gross: the payment amount is the
/// document total and the net base is derived from it.
fn direct_amount_line(
    description: String,
    amount: Decimal,
    rate: Decimal,
) -> (DocumentLine, Decimal, Decimal) {
    let net = round_cents(amount / (Decimal::ONE + rate / HUNDRED));
    let tax = amount - net;
    let line = DocumentLine {
        description,
        quantity: Decimal::ONE,
        unit_price: net,
        tax_rate: Some(rate),
    };
    (line, net, tax)
}

impl DraftPreview {
    /// Invoice for the sale's full total. Default observations list the
    /// scheduled payment dates.
    pub fn for_invoice(items: &[SaleItem], payments: &[Payment], default_rate: Decimal) -> Self {
        let (lines, subtotal, tax_total) = totals_from_items(items, default_rate);
        let observations = payments
            .iter()
            .map(|p| format!("Payment due {}", p.payment_date))
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            lines,
            subtotal,
            tax_total,
            total: subtotal + tax_total,
            observations,
        }
    }

    /// Invoice-receipt for one payment. When the payment is the sole entry
    /// on the ledger the sale's items are carried at full value; otherwise
    /// the document covers the payment amount directly.
    pub fn for_invoice_receipt(
        items: &[SaleItem],
        payment: &Payment,
        ledger_size: usize,
        default_rate: Decimal,
    ) -> Self {
        let observations = format!("Payment received {}", payment.payment_date);
        if ledger_size <= 1 {
            let (lines, subtotal, tax_total) = totals_from_items(items, default_rate);
            return Self {
                lines,
                subtotal,
                tax_total,
                total: subtotal + tax_total,
                observations,
            };
        }

        let (line, subtotal, tax_total) = direct_amount_line(
            format!("Payment on {}", payment.payment_date),
            payment.amount,
            default_rate,
        );
        Self {
            lines: vec![line],
            subtotal,
            tax_total,
            total: payment.amount,
            observations,
        }
    }

    /// Receipt for one payment against the sale's existing invoice.
    pub fn for_receipt(payment: &Payment, default_rate: Decimal) -> Self {
        let (line, subtotal, tax_total) = direct_amount_line(
            format!("Payment on {}", payment.payment_date),
            payment.amount,
            default_rate,
        );
        Self {
            lines: vec![line],
            subtotal,
            tax_total,
            total: payment.amount,
            observations: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentStatus, DocumentType, PaymentStatus};
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn sale(tax_id: Option<&str>) -> Sale {
        Sale {
            sale_id: Uuid::new_v4(),
            org_id: "org-1".to_string(),
            customer_name: "Acme Lda".to_string(),
            customer_tax_id: tax_id.map(|s| s.to_string()),
            total: dec("1000.00"),
            status: "open".to_string(),
            invoice_provider_id: None,
            invoice_reference: None,
            notes: None,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    fn settings(enabled: bool) -> OrgSettings {
        OrgSettings {
            org_id: "org-1".to_string(),
            default_tax_rate: dec("23.00"),
            fiscal_provider_enabled: enabled,
            updated_utc: Utc::now(),
        }
    }

    fn payment(amount: &str) -> Payment {
        Payment {
            payment_id: Uuid::new_v4(),
            sale_id: Uuid::new_v4(),
            org_id: "org-1".to_string(),
            amount: dec(amount),
            payment_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            method: None,
            status: PaymentStatus::Pending.as_str().to_string(),
            document_reference: None,
            provider_document_id: None,
            document_type: None,
            pdf_url: None,
            qr_code_url: None,
            attachment_url: None,
            notes: None,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    fn item(qty: &str, price: &str, rate: Option<&str>) -> SaleItem {
        SaleItem {
            sale_item_id: Uuid::new_v4(),
            sale_id: Uuid::new_v4(),
            org_id: "org-1".to_string(),
            description: "Widget".to_string(),
            quantity: dec(qty),
            unit_price: dec(price),
            tax_rate: rate.map(dec),
            sort_order: 0,
            created_utc: Utc::now(),
        }
    }

    fn document(status: DocumentStatus) -> FiscalDocument {
        FiscalDocument {
            provider_document_id: 42,
            org_id: "org-1".to_string(),
            sale_id: Uuid::new_v4(),
            payment_id: None,
            document_type: DocumentType::Invoice.as_str().to_string(),
            reference: "FT 2026/42".to_string(),
            status: status.as_str().to_string(),
            pdf_url: None,
            qr_code_url: None,
            cancellation_reason: None,
            items: serde_json::json!([]),
            issued_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    #[test]
    fn invoice_requires_tax_id() {
        let err = ensure_can_issue_invoice(&sale(None), &settings(true)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(ensure_can_issue_invoice(&sale(Some("PT123456789")), &settings(true)).is_ok());
    }

    #[test]
    fn blank_tax_id_counts_as_missing() {
        let err = ensure_can_issue_invoice(&sale(Some("   ")), &settings(true)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn issuance_requires_provider_enabled() {
        let err = ensure_can_issue_invoice(&sale(Some("PT123456789")), &settings(false))
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn receipt_requires_existing_invoice() {
        let err =
            ensure_can_issue_receipt(&sale(Some("PT123456789")), &settings(true), &payment("100.00"))
                .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let mut invoiced = sale(Some("PT123456789"));
        invoiced.invoice_provider_id = Some(7);
        invoiced.invoice_reference = Some("FT 2026/7".to_string());
        assert!(ensure_can_issue_receipt(&invoiced, &settings(true), &payment("100.00")).is_ok());
    }

    #[test]
    fn covered_payment_rejects_second_document() {
        let mut covered = payment("100.00");
        covered.document_reference = Some("FR 2026/9".to_string());
        let err = ensure_can_issue_invoice_receipt(
            &sale(Some("PT123456789")),
            &settings(true),
            &covered,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn cancel_requires_reason_and_non_terminal_status() {
        let doc = document(DocumentStatus::Final);
        assert!(matches!(
            ensure_can_cancel(&doc, " ").unwrap_err(),
            AppError::BadRequest(_)
        ));
        assert!(ensure_can_cancel(&doc, "issued in error").is_ok());

        let cancelled = document(DocumentStatus::Cancelled);
        assert!(matches!(
            ensure_can_cancel(&cancelled, "again").unwrap_err(),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            ensure_can_credit_note(&cancelled, "compensate").unwrap_err(),
            AppError::Conflict(_)
        ));
    }

    #[test]
    fn invoice_preview_uses_item_rate_or_default() {
        let items = vec![item("2", "100.00", Some("6.00")), item("1", "50.00", None)];
        let preview = DraftPreview::for_invoice(&items, &[], dec("23.00"));
        // 2 * 100 at 6% = 12.00 tax; 50 at 23% = 11.50 tax
        assert_eq!(preview.subtotal, dec("250.00"));
        assert_eq!(preview.tax_total, dec("23.50"));
        assert_eq!(preview.total, dec("273.50"));
    }

    #[test]
    fn invoice_preview_observations_from_payment_dates() {
        let items = vec![item("1", "100.00", None)];
        let preview = DraftPreview::for_invoice(&items, &[payment("50.00")], dec("23.00"));
        assert_eq!(preview.observations, "Payment due 2026-01-15");
    }

    #[test]
    fn sole_payment_invoice_receipt_carries_full_items() {
        let items = vec![item("1", "100.00", Some("23.00"))];
        let preview = DraftPreview::for_invoice_receipt(&items, &payment("123.00"), 1, dec("23.00"));
        assert_eq!(preview.subtotal, dec("100.00"));
        assert_eq!(preview.total, dec("123.00"));
    }

    #[test]
    fn partial_payment_invoice_receipt_is_direct_amount() {
        let items = vec![item("1", "100.00", Some("23.00"))];
        let preview = DraftPreview::for_invoice_receipt(&items, &payment("61.50"), 3, dec("23.00"));
        assert_eq!(preview.lines.len(), 1);
        assert_eq!(preview.total, dec("61.50"));
        assert_eq!(preview.subtotal + preview.tax_total, dec("61.50"));
    }

    #[test]
    fn receipt_preview_total_is_payment_amount() {
        let preview = DraftPreview::for_receipt(&payment("200.00"), dec("23.00"));
        assert_eq!(preview.total, dec("200.00"));
        assert_eq!(preview.subtotal + preview.tax_total, dec("200.00"));
    }
}
