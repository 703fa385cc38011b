//! Application startup and lifecycle management.

use crate::config::Config;
use crate::handlers;
use crate::services::metrics::{http_metrics_middleware, init_metrics};
use crate::services::{Database, FiscalProviderClient, SyncAgent};
use crate::AppState;
use axum::middleware::from_fn;
use axum::{
    routing::{get, patch, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application: connect, migrate, and bind the listener
    /// (port 0 = random port for testing).
    pub async fn build(config: Config) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        db.run_migrations().await?;

        let provider = FiscalProviderClient::new(config.provider.clone());
        if provider.is_configured() {
            tracing::info!("Fiscal provider client initialized");
        } else {
            tracing::warn!(
                "Fiscal provider credentials not configured - document issuance will be unavailable"
            );
        }

        let sync = SyncAgent::new(db.clone(), provider.clone());

        let state = AppState {
            db,
            provider,
            sync,
            config: config.clone(),
        };

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/metrics", get(handlers::metrics))
            // Sales
            .route("/sales", post(handlers::sales::create_sale))
            .route("/sales/:sale_id", get(handlers::sales::get_sale))
            .route(
                "/sales/:sale_id/status",
                patch(handlers::sales::update_sale_status),
            )
            // Payment ledger
            .route(
                "/sales/:sale_id/payments",
                get(handlers::payments::list_payments).post(handlers::payments::create_payment),
            )
            .route(
                "/sales/:sale_id/payments/:payment_id",
                patch(handlers::payments::update_payment)
                    .delete(handlers::payments::delete_payment),
            )
            .route(
                "/sales/:sale_id/payments/:payment_id/mark-paid",
                post(handlers::payments::mark_payment_paid),
            )
            // Installments
            .route(
                "/sales/:sale_id/installments/preview",
                post(handlers::installments::preview_installments),
            )
            .route(
                "/sales/:sale_id/installments",
                post(handlers::installments::confirm_installments),
            )
            // Fiscal documents
            .route(
                "/sales/:sale_id/documents/preview",
                post(handlers::documents::preview_document),
            )
            .route(
                "/sales/:sale_id/documents",
                post(handlers::documents::issue_document),
            )
            .route(
                "/sales/:sale_id/documents/:document_id/cancel",
                post(handlers::documents::cancel_document),
            )
            .route(
                "/sales/:sale_id/documents/:document_id/credit-note",
                post(handlers::documents::create_credit_note),
            )
            .route(
                "/sales/:sale_id/documents/:document_id/email",
                post(handlers::documents::email_document),
            )
            // Sync
            .route(
                "/sales/:sale_id/payments/:payment_id/sync-document",
                post(handlers::sync::sync_payment_document),
            )
            // Organization settings
            .route(
                "/organization/settings",
                get(handlers::organization::get_settings)
                    .put(handlers::organization::update_settings),
            )
            .layer(from_fn(http_metrics_middleware))
            .layer(from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                }),
            )
            .with_state(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Fiscal service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router).await
    }
}
