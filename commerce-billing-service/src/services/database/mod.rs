//! Database service for commerce-billing-service.
//!
//! One `Database` handle wraps the pool; the per-domain query methods live in
//! the submodules as further `impl Database` blocks.

mod party;
mod purchase;
mod purchase_return;
mod quotation;
mod sale;
mod sale_return;
mod summary;

use crate::models::{CashEntry, CashSource};
use crate::services::metrics::{record_error, start_db_timer};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgConnection;
use std::time::Duration;
use tracing::{info, instrument};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "commerce-billing-service"))]
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

    /// Wrap an existing pool (tests configure theirs per schema).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let _timer = start_db_timer("health_check");

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
}

/// Map a write error: unique-key violations become a 409 with `conflict` as
/// the message, dangling references (unknown party, purchase, sale) a 422.
pub(crate) fn write_error(context: &str, conflict: &str, e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(anyhow::anyhow!("{}", conflict))
        }
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
            AppError::Unprocessable(anyhow::anyhow!(
                "Failed to {}: referenced record does not exist",
                context
            ))
        }
        _ => {
            record_error("database", context);
            AppError::DatabaseError(anyhow::anyhow!("Failed to {}: {}", context, e))
        }
    }
}

/// Next document number for a company (`MAX + 1`).
///
/// Takes a transaction-scoped advisory lock on `(table, company)` first, so
/// concurrent adds for the same company are numbered one after another.
pub(crate) async fn next_number(
    conn: &mut PgConnection,
    table: &'static str,
    column: &'static str,
    company_id: i64,
) -> Result<i64, AppError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, $2))")
        .bind(table)
        .bind(company_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock numbering: {}", e)))?;

    let sql = format!(
        "SELECT COALESCE(MAX({column}), 0) + 1 FROM {table} WHERE company_id = $1"
    );
    sqlx::query_scalar::<_, i64>(&sql)
        .bind(company_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to compute next {}: {}", column, e))
        })
}

/// Append one row to the cash journal.
pub(crate) async fn insert_cash_entry(
    conn: &mut PgConnection,
    entry: &CashEntry,
) -> Result<(), AppError> {
    let (purchase_id, sale_id, purchase_return_id, sale_return_id) = match entry.source {
        CashSource::Purchase(id) => (Some(id), None, None, None),
        CashSource::Sale(id) => (None, Some(id), None, None),
        CashSource::PurchaseReturn(id) => (None, None, Some(id), None),
        CashSource::SaleReturn(id) => (None, None, None, Some(id)),
    };

    sqlx::query(
        r#"
        INSERT INTO cash_in_out (transaction_date_time, company_id, cash_in, cash_out, purchase_id, sale_id, purchase_return_id, sale_return_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(entry.transaction_date_time)
    .bind(entry.company_id)
    .bind(entry.cash_in)
    .bind(entry.cash_out)
    .bind(purchase_id)
    .bind(sale_id)
    .bind(purchase_return_id)
    .bind(sale_return_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to record cash entry: {}", e)))?;

    Ok(())
}
