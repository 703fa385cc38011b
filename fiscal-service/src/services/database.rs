//! Database service for fiscal-service.
//!
//! The payment ledger for one sale is the unit of consistency; every query
//! is scoped by `org_id`.

use crate::models::{
    CreatePayment, CreateSale, FiscalDocument, OrgSettings, Payment, PaymentStatus, Sale,
    SaleItem, SaleStatus, UpdateOrgSettings, UpdatePayment, UpsertFiscalDocument,
};
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "fiscal-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Sale Operations
    // -------------------------------------------------------------------------

    /// Create a sale together with its line items.
    #[instrument(skip(self, input), fields(org_id = %input.org_id))]
    pub async fn create_sale(&self, input: &CreateSale) -> Result<Sale, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_sale"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to begin: {}", e)))?;

        let sale_id = Uuid::new_v4();
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            INSERT INTO sales (sale_id, org_id, customer_name, customer_tax_id, total, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING sale_id, org_id, customer_name, customer_tax_id, total, status,
                      invoice_provider_id, invoice_reference, notes, created_utc, updated_utc
            "#,
        )
        .bind(sale_id)
        .bind(&input.org_id)
        .bind(&input.customer_name)
        .bind(&input.customer_tax_id)
        .bind(input.total)
        .bind(SaleStatus::Open.as_str())
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create sale: {}", e)))?;

        for item in &input.items {
            sqlx::query(
                r#"
                INSERT INTO sale_items (sale_item_id, sale_id, org_id, description, quantity, unit_price, tax_rate, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(sale_id)
            .bind(&input.org_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.tax_rate)
            .bind(item.sort_order)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to create sale item: {}", e))
            })?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        info!(sale_id = %sale.sale_id, customer = %sale.customer_name, "Sale created");

        Ok(sale)
    }

    /// Get a sale by ID.
    #[instrument(skip(self), fields(org_id = %org_id, sale_id = %sale_id))]
    pub async fn get_sale(&self, org_id: &str, sale_id: Uuid) -> Result<Option<Sale>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_sale"])
            .start_timer();

        let sale = sqlx::query_as::<_, Sale>(
            r#"
            SELECT sale_id, org_id, customer_name, customer_tax_id, total, status,
                   invoice_provider_id, invoice_reference, notes, created_utc, updated_utc
            FROM sales
            WHERE org_id = $1 AND sale_id = $2
            "#,
        )
        .bind(org_id)
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get sale: {}", e)))?;

        timer.observe_duration();

        Ok(sale)
    }

    /// Update a sale's status.
    #[instrument(skip(self), fields(org_id = %org_id, sale_id = %sale_id))]
    pub async fn update_sale_status(
        &self,
        org_id: &str,
        sale_id: Uuid,
        status: SaleStatus,
    ) -> Result<Option<Sale>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_sale_status"])
            .start_timer();

        let sale = sqlx::query_as::<_, Sale>(
            r#"
            UPDATE sales
            SET status = $3, updated_utc = now()
            WHERE org_id = $1 AND sale_id = $2
            RETURNING sale_id, org_id, customer_name, customer_tax_id, total, status,
                      invoice_provider_id, invoice_reference, notes, created_utc, updated_utc
            "#,
        )
        .bind(org_id)
        .bind(sale_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update sale status: {}", e))
        })?;

        timer.observe_duration();

        Ok(sale)
    }

    /// List a sale's line items in display order.
    #[instrument(skip(self), fields(org_id = %org_id, sale_id = %sale_id))]
    pub async fn list_sale_items(
        &self,
        org_id: &str,
        sale_id: Uuid,
    ) -> Result<Vec<SaleItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_sale_items"])
            .start_timer();

        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT sale_item_id, sale_id, org_id, description, quantity, unit_price, tax_rate,
                   sort_order, created_utc
            FROM sale_items
            WHERE org_id = $1 AND sale_id = $2
            ORDER BY sort_order, created_utc
            "#,
        )
        .bind(org_id)
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list sale items: {}", e)))?;

        timer.observe_duration();

        Ok(items)
    }

    /// Attach the sale-level invoice linkage.
    #[instrument(skip(self), fields(org_id = %org_id, sale_id = %sale_id))]
    pub async fn set_sale_invoice(
        &self,
        org_id: &str,
        sale_id: Uuid,
        provider_document_id: i64,
        reference: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE sales
            SET invoice_provider_id = $3, invoice_reference = $4, updated_utc = now()
            WHERE org_id = $1 AND sale_id = $2
            "#,
        )
        .bind(org_id)
        .bind(sale_id)
        .bind(provider_document_id)
        .bind(reference)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to set sale invoice: {}", e)))?;

        Ok(())
    }

    /// Clear the sale-level invoice linkage (after cancellation, so receipt
    /// issuance is gated again).
    #[instrument(skip(self), fields(org_id = %org_id, sale_id = %sale_id))]
    pub async fn clear_sale_invoice(&self, org_id: &str, sale_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE sales
            SET invoice_provider_id = NULL, invoice_reference = NULL, updated_utc = now()
            WHERE org_id = $1 AND sale_id = $2
            "#,
        )
        .bind(org_id)
        .bind(sale_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to clear sale invoice: {}", e))
        })?;

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Payment Operations
    // -------------------------------------------------------------------------

    /// Create a payment on a sale's ledger.
    #[instrument(skip(self, input), fields(org_id = %input.org_id, sale_id = %input.sale_id))]
    pub async fn create_payment(&self, input: &CreatePayment) -> Result<Payment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_payment"])
            .start_timer();

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (payment_id, sale_id, org_id, amount, payment_date, method, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING payment_id, sale_id, org_id, amount, payment_date, method, status,
                      document_reference, provider_document_id, document_type, pdf_url,
                      qr_code_url, attachment_url, notes, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.sale_id)
        .bind(&input.org_id)
        .bind(input.amount)
        .bind(input.payment_date)
        .bind(input.method.map(|m| m.as_str()))
        .bind(PaymentStatus::Pending.as_str())
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create payment: {}", e)))?;

        timer.observe_duration();

        info!(payment_id = %payment.payment_id, amount = %payment.amount, "Payment created");

        Ok(payment)
    }

    /// List the full ledger for a sale, oldest scheduled first.
    #[instrument(skip(self), fields(org_id = %org_id, sale_id = %sale_id))]
    pub async fn list_payments(
        &self,
        org_id: &str,
        sale_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, sale_id, org_id, amount, payment_date, method, status,
                   document_reference, provider_document_id, document_type, pdf_url,
                   qr_code_url, attachment_url, notes, created_utc, updated_utc
            FROM payments
            WHERE org_id = $1 AND sale_id = $2
            ORDER BY payment_date, created_utc
            "#,
        )
        .bind(org_id)
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        timer.observe_duration();

        Ok(payments)
    }

    /// Get one payment on a sale's ledger.
    #[instrument(skip(self), fields(org_id = %org_id, payment_id = %payment_id))]
    pub async fn get_payment(
        &self,
        org_id: &str,
        sale_id: Uuid,
        payment_id: Uuid,
    ) -> Result<Option<Payment>, AppError> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, sale_id, org_id, amount, payment_date, method, status,
                   document_reference, provider_document_id, document_type, pdf_url,
                   qr_code_url, attachment_url, notes, created_utc, updated_utc
            FROM payments
            WHERE org_id = $1 AND sale_id = $2 AND payment_id = $3
            "#,
        )
        .bind(org_id)
        .bind(sale_id)
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get payment: {}", e)))?;

        Ok(payment)
    }

    /// Edit a pending payment. The status guard is repeated in SQL so a
    /// concurrent transition cannot slip an edit onto a paid record.
    #[instrument(skip(self, changes), fields(org_id = %org_id, payment_id = %payment_id))]
    pub async fn update_payment(
        &self,
        org_id: &str,
        sale_id: Uuid,
        payment_id: Uuid,
        changes: &UpdatePayment,
    ) -> Result<Option<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_payment"])
            .start_timer();

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET amount = COALESCE($4, amount),
                payment_date = COALESCE($5, payment_date),
                method = COALESCE($6, method),
                notes = COALESCE($7, notes),
                updated_utc = now()
            WHERE org_id = $1 AND sale_id = $2 AND payment_id = $3 AND status = 'pending'
            RETURNING payment_id, sale_id, org_id, amount, payment_date, method, status,
                      document_reference, provider_document_id, document_type, pdf_url,
                      qr_code_url, attachment_url, notes, created_utc, updated_utc
            "#,
        )
        .bind(org_id)
        .bind(sale_id)
        .bind(payment_id)
        .bind(changes.amount)
        .bind(changes.payment_date)
        .bind(changes.method.map(|m| m.as_str()))
        .bind(&changes.notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update payment: {}", e)))?;

        timer.observe_duration();

        Ok(payment)
    }

    /// Transition a payment pending -> paid.
    #[instrument(skip(self), fields(org_id = %org_id, payment_id = %payment_id))]
    pub async fn mark_payment_paid(
        &self,
        org_id: &str,
        sale_id: Uuid,
        payment_id: Uuid,
    ) -> Result<Option<Payment>, AppError> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = 'paid', updated_utc = now()
            WHERE org_id = $1 AND sale_id = $2 AND payment_id = $3
            RETURNING payment_id, sale_id, org_id, amount, payment_date, method, status,
                      document_reference, provider_document_id, document_type, pdf_url,
                      qr_code_url, attachment_url, notes, created_utc, updated_utc
            "#,
        )
        .bind(org_id)
        .bind(sale_id)
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to mark payment paid: {}", e))
        })?;

        Ok(payment)
    }

    /// Delete a payment row. Eligibility (pending, unprotected, sale not
    /// delivered) is checked by the caller against the fetched records.
    #[instrument(skip(self), fields(org_id = %org_id, payment_id = %payment_id))]
    pub async fn delete_payment(
        &self,
        org_id: &str,
        sale_id: Uuid,
        payment_id: Uuid,
    ) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_payment"])
            .start_timer();

        let result = sqlx::query(
            r#"
            DELETE FROM payments
            WHERE org_id = $1 AND sale_id = $2 AND payment_id = $3
            "#,
        )
        .bind(org_id)
        .bind(sale_id)
        .bind(payment_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete payment: {}", e)))?;

        timer.observe_duration();

        Ok(result.rows_affected())
    }

    /// Attach a fiscal document reference and artifacts to a payment.
    #[instrument(skip(self), fields(org_id = %org_id, payment_id = %payment_id))]
    pub async fn set_payment_document(
        &self,
        org_id: &str,
        payment_id: Uuid,
        reference: &str,
        provider_document_id: i64,
        document_type: &str,
        pdf_url: Option<&str>,
        qr_code_url: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE payments
            SET document_reference = $3, provider_document_id = $4, document_type = $5,
                pdf_url = $6, qr_code_url = $7, updated_utc = now()
            WHERE org_id = $1 AND payment_id = $2
            "#,
        )
        .bind(org_id)
        .bind(payment_id)
        .bind(reference)
        .bind(provider_document_id)
        .bind(document_type)
        .bind(pdf_url)
        .bind(qr_code_url)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to set payment document: {}", e))
        })?;

        Ok(())
    }

    /// Overwrite a payment's cached document artifacts (sync agent path).
    #[instrument(skip(self), fields(org_id = %org_id, payment_id = %payment_id))]
    pub async fn update_payment_artifacts(
        &self,
        org_id: &str,
        payment_id: Uuid,
        pdf_url: Option<&str>,
        qr_code_url: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE payments
            SET pdf_url = $3, qr_code_url = $4, updated_utc = now()
            WHERE org_id = $1 AND payment_id = $2
            "#,
        )
        .bind(org_id)
        .bind(payment_id)
        .bind(pdf_url)
        .bind(qr_code_url)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update payment artifacts: {}", e))
        })?;

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Fiscal Document Cache Operations
    // -------------------------------------------------------------------------

    /// Insert or overwrite a cached document row. Idempotent: replaying the
    /// same snapshot leaves the row unchanged apart from `updated_utc`.
    #[instrument(skip(self, input), fields(org_id = %input.org_id, document_id = input.provider_document_id))]
    pub async fn upsert_fiscal_document(
        &self,
        input: &UpsertFiscalDocument,
    ) -> Result<FiscalDocument, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_fiscal_document"])
            .start_timer();

        let items = serde_json::to_value(&input.items)
            .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?;

        let document = sqlx::query_as::<_, FiscalDocument>(
            r#"
            INSERT INTO fiscal_documents
                (provider_document_id, org_id, sale_id, payment_id, document_type, reference,
                 status, pdf_url, qr_code_url, cancellation_reason, items)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (org_id, provider_document_id, document_type) DO UPDATE
            SET status = EXCLUDED.status,
                pdf_url = EXCLUDED.pdf_url,
                qr_code_url = EXCLUDED.qr_code_url,
                cancellation_reason = EXCLUDED.cancellation_reason,
                updated_utc = now()
            RETURNING provider_document_id, org_id, sale_id, payment_id, document_type,
                      reference, status, pdf_url, qr_code_url, cancellation_reason, items,
                      issued_utc, updated_utc
            "#,
        )
        .bind(input.provider_document_id)
        .bind(&input.org_id)
        .bind(input.sale_id)
        .bind(input.payment_id)
        .bind(input.document_type.as_str())
        .bind(&input.reference)
        .bind(input.status.as_str())
        .bind(&input.pdf_url)
        .bind(&input.qr_code_url)
        .bind(&input.cancellation_reason)
        .bind(items)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to upsert fiscal document: {}", e))
        })?;

        timer.observe_duration();

        Ok(document)
    }

    /// Get a cached document by provider id.
    #[instrument(skip(self), fields(org_id = %org_id, document_id = provider_document_id))]
    pub async fn get_fiscal_document(
        &self,
        org_id: &str,
        provider_document_id: i64,
    ) -> Result<Option<FiscalDocument>, AppError> {
        let document = sqlx::query_as::<_, FiscalDocument>(
            r#"
            SELECT provider_document_id, org_id, sale_id, payment_id, document_type, reference,
                   status, pdf_url, qr_code_url, cancellation_reason, items, issued_utc, updated_utc
            FROM fiscal_documents
            WHERE org_id = $1 AND provider_document_id = $2
            "#,
        )
        .bind(org_id)
        .bind(provider_document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get fiscal document: {}", e))
        })?;

        Ok(document)
    }

    /// List cached documents for a sale, newest first.
    #[instrument(skip(self), fields(org_id = %org_id, sale_id = %sale_id))]
    pub async fn list_sale_documents(
        &self,
        org_id: &str,
        sale_id: Uuid,
    ) -> Result<Vec<FiscalDocument>, AppError> {
        let documents = sqlx::query_as::<_, FiscalDocument>(
            r#"
            SELECT provider_document_id, org_id, sale_id, payment_id, document_type, reference,
                   status, pdf_url, qr_code_url, cancellation_reason, items, issued_utc, updated_utc
            FROM fiscal_documents
            WHERE org_id = $1 AND sale_id = $2
            ORDER BY issued_utc DESC
            "#,
        )
        .bind(org_id)
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list sale documents: {}", e))
        })?;

        Ok(documents)
    }

    // -------------------------------------------------------------------------
    // Organization Settings Operations
    // -------------------------------------------------------------------------

    /// Get organization settings, falling back to defaults for tenants that
    /// were never provisioned.
    #[instrument(skip(self), fields(org_id = %org_id))]
    pub async fn get_org_settings(&self, org_id: &str) -> Result<OrgSettings, AppError> {
        let settings = sqlx::query_as::<_, OrgSettings>(
            r#"
            SELECT org_id, default_tax_rate, fiscal_provider_enabled, updated_utc
            FROM org_settings
            WHERE org_id = $1
            "#,
        )
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get org settings: {}", e))
        })?;

        Ok(settings.unwrap_or_else(|| OrgSettings::defaults(org_id)))
    }

    /// Provision or update organization settings.
    #[instrument(skip(self, input), fields(org_id = %org_id))]
    pub async fn upsert_org_settings(
        &self,
        org_id: &str,
        input: &UpdateOrgSettings,
    ) -> Result<OrgSettings, AppError> {
        let settings = sqlx::query_as::<_, OrgSettings>(
            r#"
            INSERT INTO org_settings (org_id, default_tax_rate, fiscal_provider_enabled)
            VALUES ($1, $2, $3)
            ON CONFLICT (org_id) DO UPDATE
            SET default_tax_rate = EXCLUDED.default_tax_rate,
                fiscal_provider_enabled = EXCLUDED.fiscal_provider_enabled,
                updated_utc = now()
            RETURNING org_id, default_tax_rate, fiscal_provider_enabled, updated_utc
            "#,
        )
        .bind(org_id)
        .bind(input.default_tax_rate)
        .bind(input.fiscal_provider_enabled)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to upsert org settings: {}", e))
        })?;

        info!(org_id = %settings.org_id, "Organization settings updated");

        Ok(settings)
    }
}
