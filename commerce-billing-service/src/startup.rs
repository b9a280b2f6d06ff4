//! Application startup and lifecycle management.

use crate::config::BillingConfig;
use crate::handlers;
use crate::middleware::CapabilityChecker;
use crate::services::{init_metrics, Database, InventoryClient, InventorySync};
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::security_headers::security_headers_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: BillingConfig,
    pub db: Arc<Database>,
    pub inventory: Arc<dyn InventorySync>,
    pub inventory_enabled: bool,
    pub capability_checker: Arc<CapabilityChecker>,
}

impl AppState {
    /// Wire the state from configuration and an already-connected database.
    pub fn new(config: BillingConfig, db: Database) -> Self {
        let inventory = InventoryClient::new(config.inventory.clone());
        let inventory_enabled = inventory.is_enabled();
        if !inventory_enabled {
            tracing::warn!("INVENTORY_SERVICE_URL not set; stock movements will not be reported");
        }

        let capability_checker =
            CapabilityChecker::new(config.auth.access_token_secret.as_ref());
        if !capability_checker.is_enabled() {
            tracing::warn!("ACCESS_TOKEN_SECRET not set; trusting gateway-forwarded identity");
        }

        Self {
            config,
            db: Arc::new(db),
            inventory: Arc::new(inventory),
            inventory_enabled,
            capability_checker: Arc::new(capability_checker),
        }
    }
}

/// All HTTP routes with the shared middleware stack.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::health::metrics_handler))
        // Parties
        .route("/party/get-all-parties", post(handlers::party::get_all_parties))
        .route("/party/get-party", get(handlers::party::get_party))
        .route("/party/add-party", post(handlers::party::add_party))
        .route("/party/update-party", put(handlers::party::update_party))
        // Purchases
        .route(
            "/purchase/get-all-purchases",
            post(handlers::purchase::get_all_purchases),
        )
        .route("/purchase/get-purchase", get(handlers::purchase::get_purchase))
        .route("/purchase/add-purchase", post(handlers::purchase::add_purchase))
        .route(
            "/purchase/update-purchase",
            put(handlers::purchase::update_purchase),
        )
        // Sales
        .route("/sale/get-all-sales", post(handlers::sale::get_all_sales))
        .route("/sale/get-sale", get(handlers::sale::get_sale))
        .route("/sale/add-sale", post(handlers::sale::add_sale))
        .route("/sale/update-sale", put(handlers::sale::update_sale))
        // Quotations
        .route(
            "/quotation/get-all-quotations",
            post(handlers::quotation::get_all_quotations),
        )
        .route(
            "/quotation/get-quotation",
            get(handlers::quotation::get_quotation),
        )
        .route(
            "/quotation/add-quotation",
            post(handlers::quotation::add_quotation),
        )
        .route(
            "/quotation/update-quotation",
            put(handlers::quotation::update_quotation),
        )
        // Returns
        .route(
            "/purchase-return/get-all-purchase-returns",
            post(handlers::purchase_return::get_all_purchase_returns),
        )
        .route(
            "/purchase-return/get-purchase-return",
            get(handlers::purchase_return::get_purchase_return),
        )
        .route(
            "/purchase-return/get-purchase-returns-of-purchase",
            get(handlers::purchase_return::get_purchase_returns_of_purchase),
        )
        .route(
            "/purchase-return/add-purchase-return",
            post(handlers::purchase_return::add_purchase_return),
        )
        .route(
            "/sale-return/get-all-sale-returns",
            post(handlers::sale_return::get_all_sale_returns),
        )
        .route(
            "/sale-return/get-sale-return",
            get(handlers::sale_return::get_sale_return),
        )
        .route(
            "/sale-return/get-sale-returns-of-sale",
            get(handlers::sale_return::get_sale_returns_of_sale),
        )
        .route(
            "/sale-return/add-sale-return",
            post(handlers::sale_return::add_sale_return),
        )
        // Summary
        .route(
            "/summary/get-cashflow-summary",
            post(handlers::summary::get_cash_flow_summary),
        )
        .route(
            "/summary/get-topsellers-for-current-month/:companyId",
            get(handlers::summary::get_top_sellers_for_current_month),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: BillingConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    /// Use this in tests when migrations are already applied by the test harness.
    pub async fn build_without_migrations(config: BillingConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(config: BillingConfig, run_migrations: bool) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        if run_migrations {
            db.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
        }

        let addr: SocketAddr = format!("{}:{}", config.common.host, config.common.port)
            .parse()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!(
                    "Invalid listen address {}:{}: {}",
                    config.common.host,
                    config.common.port,
                    e
                ))
            })?;

        let state = AppState::new(config, db);

        let http_listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!(http_port = http_port, "Billing service listener bound");

        Ok(Self {
            http_port,
            http_listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let app = router(self.state);

        tracing::info!(
            service = "commerce-billing-service",
            version = env!("CARGO_PKG_VERSION"),
            http_port = self.http_port,
            "Service ready to accept connections"
        );

        axum::serve(self.http_listener, app).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
