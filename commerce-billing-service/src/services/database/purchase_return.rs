use super::{next_number, write_error, Database};
use crate::dtos::items::PurchaseItemRequest;
use crate::dtos::purchase_return::{AddPurchaseReturnRequest, PurchaseReturnCursor};
use crate::models::{fetch_limit, ListReturnsFilter, PurchaseReturn, PurchaseReturnItem};
use crate::services::metrics::start_db_timer;
use crate::services::reconcile::ensure_unique_item_ids;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::{info, instrument};

const RETURN_COLUMNS: &str = "purchase_return_id, created_at, purchase_id, purchase_return_number, company_id, subtotal, tax, tax_percent, tax_name, total_after_tax";

const RETURN_ITEM_COLUMNS: &str = "purchase_return_id, item_id, item_name, company_id, unit_id, unit_name, units_purchased, price_per_unit, subtotal, tax, tax_percent, total_after_tax, created_at, updated_at";

impl Database {
    /// One page of a company's purchase returns, newest first.
    #[instrument(skip(self, filter, cursor), fields(company_id = %company_id))]
    pub async fn list_purchase_returns(
        &self,
        company_id: i64,
        page_size: i64,
        filter: &ListReturnsFilter,
        cursor: Option<&PurchaseReturnCursor>,
    ) -> Result<Vec<PurchaseReturn>, AppError> {
        let _timer = start_db_timer("list_purchase_returns");

        let (from, to) = filter.created_between.unzip();
        let sql = format!(
            r#"
            SELECT {RETURN_COLUMNS}
            FROM purchase_returns
            WHERE company_id = $1
              AND ($2::timestamptz IS NULL OR created_at BETWEEN $2 AND $3)
              AND ($4::bigint IS NULL OR purchase_return_number = $4)
              AND ($5::timestamptz IS NULL OR created_at < $5 OR (created_at = $5 AND purchase_return_id > $6))
            ORDER BY created_at DESC, purchase_return_id ASC
            LIMIT $7
            "#
        );

        sqlx::query_as::<_, PurchaseReturn>(&sql)
            .bind(company_id)
            .bind(from)
            .bind(to)
            .bind(filter.return_number)
            .bind(cursor.map(|c| c.created_at))
            .bind(cursor.map(|c| c.purchase_return_id))
            .bind(fetch_limit(page_size))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list purchase returns: {}", e))
            })
    }

    #[instrument(skip(self), fields(company_id = %company_id, purchase_return_id = %purchase_return_id))]
    pub async fn get_purchase_return(
        &self,
        company_id: i64,
        purchase_return_id: i64,
    ) -> Result<Option<(PurchaseReturn, Vec<PurchaseReturnItem>)>, AppError> {
        let _timer = start_db_timer("get_purchase_return");

        let sql = format!(
            "SELECT {RETURN_COLUMNS} FROM purchase_returns WHERE company_id = $1 AND purchase_return_id = $2"
        );
        let purchase_return = sqlx::query_as::<_, PurchaseReturn>(&sql)
            .bind(company_id)
            .bind(purchase_return_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to get purchase return: {}", e))
            })?;

        let Some(purchase_return) = purchase_return else {
            return Ok(None);
        };
        let mut items = self
            .purchase_return_items(company_id, &[purchase_return_id])
            .await?;
        let items = items.remove(&purchase_return_id).unwrap_or_default();

        Ok(Some((purchase_return, items)))
    }

    /// Every return made against one purchase, oldest first, with lines.
    #[instrument(skip(self), fields(company_id = %company_id, purchase_id = %purchase_id))]
    pub async fn get_purchase_returns_of_purchase(
        &self,
        company_id: i64,
        purchase_id: i64,
    ) -> Result<Vec<(PurchaseReturn, Vec<PurchaseReturnItem>)>, AppError> {
        let _timer = start_db_timer("get_purchase_returns_of_purchase");

        let sql = format!(
            "SELECT {RETURN_COLUMNS} FROM purchase_returns WHERE company_id = $1 AND purchase_id = $2 ORDER BY created_at, purchase_return_id"
        );
        let returns = sqlx::query_as::<_, PurchaseReturn>(&sql)
            .bind(company_id)
            .bind(purchase_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list returns of purchase: {}", e))
            })?;

        let ids: Vec<i64> = returns.iter().map(|r| r.purchase_return_id).collect();
        let mut items = self.purchase_return_items(company_id, &ids).await?;

        Ok(returns
            .into_iter()
            .map(|r| {
                let lines = items.remove(&r.purchase_return_id).unwrap_or_default();
                (r, lines)
            })
            .collect())
    }

    /// Record a return against an existing purchase of the company (404 otherwise).
    #[instrument(skip(self, request), fields(company_id = %request.company_id, purchase_id = %request.purchase_id))]
    pub async fn add_purchase_return(
        &self,
        created_at: DateTime<Utc>,
        request: &AddPurchaseReturnRequest,
    ) -> Result<(PurchaseReturn, Vec<PurchaseReturnItem>), AppError> {
        let _timer = start_db_timer("add_purchase_return");
        ensure_unique_item_ids(&request.items)?;
        let company_id = request.company_id;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e)))?;

        let purchase_exists = sqlx::query_scalar::<_, i64>(
            "SELECT purchase_id FROM purchases WHERE company_id = $1 AND purchase_id = $2 FOR SHARE",
        )
        .bind(company_id)
        .bind(request.purchase_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get purchase: {}", e)))?
        .is_some();

        if !purchase_exists {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "purchase {} not found",
                request.purchase_id
            )));
        }

        let number = match request.purchase_return_number {
            Some(number) => number,
            None => {
                next_number(&mut tx, "purchase_returns", "purchase_return_number", company_id)
                    .await?
            }
        };

        let sql = format!(
            r#"
            INSERT INTO purchase_returns (created_at, purchase_id, purchase_return_number, company_id, subtotal, tax, tax_percent, tax_name, total_after_tax)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {RETURN_COLUMNS}
            "#
        );
        let purchase_return = sqlx::query_as::<_, PurchaseReturn>(&sql)
            .bind(created_at)
            .bind(request.purchase_id)
            .bind(number)
            .bind(company_id)
            .bind(request.subtotal)
            .bind(request.tax)
            .bind(request.tax_percent)
            .bind(&request.tax_name)
            .bind(request.total_after_tax)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| write_error("add purchase return", "purchase return number already used", e))?;

        let mut items = Vec::with_capacity(request.items.len());
        for item in &request.items {
            items.push(insert_item(&mut tx, &purchase_return, item).await?);
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit purchase return: {}", e))
        })?;

        info!(
            purchase_return_id = purchase_return.purchase_return_id,
            purchase_return_number = purchase_return.purchase_return_number,
            "Purchase return created"
        );
        Ok((purchase_return, items))
    }

    async fn purchase_return_items(
        &self,
        company_id: i64,
        purchase_return_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<PurchaseReturnItem>>, AppError> {
        let sql = format!(
            "SELECT {RETURN_ITEM_COLUMNS} FROM purchase_return_items WHERE company_id = $1 AND purchase_return_id = ANY($2) ORDER BY purchase_return_id, item_id"
        );
        let rows = sqlx::query_as::<_, PurchaseReturnItem>(&sql)
            .bind(company_id)
            .bind(purchase_return_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to load purchase return items: {}", e))
            })?;

        let mut grouped: HashMap<i64, Vec<PurchaseReturnItem>> = HashMap::new();
        for row in rows {
            grouped.entry(row.purchase_return_id).or_default().push(row);
        }
        Ok(grouped)
    }
}

async fn insert_item(
    conn: &mut PgConnection,
    purchase_return: &PurchaseReturn,
    item: &PurchaseItemRequest,
) -> Result<PurchaseReturnItem, AppError> {
    let sql = format!(
        r#"
        INSERT INTO purchase_return_items (purchase_return_id, item_id, item_name, company_id, unit_id, unit_name, units_purchased, price_per_unit, subtotal, tax, tax_percent, total_after_tax, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
        RETURNING {RETURN_ITEM_COLUMNS}
        "#
    );
    sqlx::query_as::<_, PurchaseReturnItem>(&sql)
        .bind(purchase_return.purchase_return_id)
        .bind(item.item_id)
        .bind(&item.item_name)
        .bind(purchase_return.company_id)
        .bind(item.unit_id)
        .bind(&item.unit_name)
        .bind(item.units_purchased)
        .bind(item.price_per_unit)
        .bind(item.subtotal)
        .bind(item.tax)
        .bind(item.tax_percent)
        .bind(item.total_after_tax)
        .bind(purchase_return.created_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| write_error("add purchase return item", "duplicate itemId in items", e))
}
