use super::{insert_cash_entry, next_number, write_error, Database};
use crate::dtos::items::SaleItemRequest;
use crate::dtos::sale_return::{AddSaleReturnRequest, SaleReturnCursor};
use crate::models::{
    fetch_limit, CashEntry, CashSource, ListReturnsFilter, SaleReturn, SaleReturnItem,
};
use crate::services::metrics::start_db_timer;
use crate::services::reconcile::ensure_unique_item_ids;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::{info, instrument};

const RETURN_COLUMNS: &str = "sale_return_id, created_at, sale_id, sale_return_number, company_id, subtotal, tax, tax_percent, tax_name, total_after_tax";

const RETURN_ITEM_COLUMNS: &str = "sale_return_id, item_id, item_name, company_id, unit_id, unit_name, units_sold, price_per_unit, subtotal, tax, tax_percent, total_after_tax, created_at, updated_at";

impl Database {
    /// One page of a company's sale returns, newest first.
    #[instrument(skip(self, filter, cursor), fields(company_id = %company_id))]
    pub async fn list_sale_returns(
        &self,
        company_id: i64,
        page_size: i64,
        filter: &ListReturnsFilter,
        cursor: Option<&SaleReturnCursor>,
    ) -> Result<Vec<SaleReturn>, AppError> {
        let _timer = start_db_timer("list_sale_returns");

        let (from, to) = filter.created_between.unzip();
        let sql = format!(
            r#"
            SELECT {RETURN_COLUMNS}
            FROM sale_returns
            WHERE company_id = $1
              AND ($2::timestamptz IS NULL OR created_at BETWEEN $2 AND $3)
              AND ($4::bigint IS NULL OR sale_return_number = $4)
              AND ($5::timestamptz IS NULL OR created_at < $5 OR (created_at = $5 AND sale_return_id > $6))
            ORDER BY created_at DESC, sale_return_id ASC
            LIMIT $7
            "#
        );

        sqlx::query_as::<_, SaleReturn>(&sql)
            .bind(company_id)
            .bind(from)
            .bind(to)
            .bind(filter.return_number)
            .bind(cursor.map(|c| c.created_at))
            .bind(cursor.map(|c| c.sale_return_id))
            .bind(fetch_limit(page_size))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list sale returns: {}", e))
            })
    }

    #[instrument(skip(self), fields(company_id = %company_id, sale_return_id = %sale_return_id))]
    pub async fn get_sale_return(
        &self,
        company_id: i64,
        sale_return_id: i64,
    ) -> Result<Option<(SaleReturn, Vec<SaleReturnItem>)>, AppError> {
        let _timer = start_db_timer("get_sale_return");

        let sql = format!(
            "SELECT {RETURN_COLUMNS} FROM sale_returns WHERE company_id = $1 AND sale_return_id = $2"
        );
        let sale_return = sqlx::query_as::<_, SaleReturn>(&sql)
            .bind(company_id)
            .bind(sale_return_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to get sale return: {}", e))
            })?;

        let Some(sale_return) = sale_return else {
            return Ok(None);
        };
        let mut items = self
            .sale_return_items(company_id, &[sale_return_id])
            .await?;
        let items = items.remove(&sale_return_id).unwrap_or_default();

        Ok(Some((sale_return, items)))
    }

    /// Every return made against one sale, oldest first, with lines.
    #[instrument(skip(self), fields(company_id = %company_id, sale_id = %sale_id))]
    pub async fn get_sale_returns_of_sale(
        &self,
        company_id: i64,
        sale_id: i64,
    ) -> Result<Vec<(SaleReturn, Vec<SaleReturnItem>)>, AppError> {
        let _timer = start_db_timer("get_sale_returns_of_sale");

        let sql = format!(
            "SELECT {RETURN_COLUMNS} FROM sale_returns WHERE company_id = $1 AND sale_id = $2 ORDER BY created_at, sale_return_id"
        );
        let returns = sqlx::query_as::<_, SaleReturn>(&sql)
            .bind(company_id)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list returns of sale: {}", e))
            })?;

        let ids: Vec<i64> = returns.iter().map(|r| r.sale_return_id).collect();
        let mut items = self.sale_return_items(company_id, &ids).await?;

        Ok(returns
            .into_iter()
            .map(|r| {
                let lines = items.remove(&r.sale_return_id).unwrap_or_default();
                (r, lines)
            })
            .collect())
    }

    /// Record a return against an existing sale of the company (404 otherwise).
    /// Cash refunded to the customer is journaled as cash out.
    #[instrument(skip(self, request), fields(company_id = %request.company_id, sale_id = %request.sale_id))]
    pub async fn add_sale_return(
        &self,
        created_at: DateTime<Utc>,
        request: &AddSaleReturnRequest,
    ) -> Result<(SaleReturn, Vec<SaleReturnItem>), AppError> {
        let _timer = start_db_timer("add_sale_return");
        ensure_unique_item_ids(&request.items)?;
        let company_id = request.company_id;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e)))?;

        let sale_exists = sqlx::query_scalar::<_, i64>(
            "SELECT sale_id FROM sales WHERE company_id = $1 AND sale_id = $2 FOR SHARE",
        )
        .bind(company_id)
        .bind(request.sale_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get sale: {}", e)))?
        .is_some();

        if !sale_exists {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "sale {} not found",
                request.sale_id
            )));
        }

        let number = match request.sale_return_number {
            Some(number) => number,
            None => {
                next_number(&mut tx, "sale_returns", "sale_return_number", company_id)
                    .await?
            }
        };

        let sql = format!(
            r#"
            INSERT INTO sale_returns (created_at, sale_id, sale_return_number, company_id, subtotal, tax, tax_percent, tax_name, total_after_tax)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {RETURN_COLUMNS}
            "#
        );
        let sale_return = sqlx::query_as::<_, SaleReturn>(&sql)
            .bind(created_at)
            .bind(request.sale_id)
            .bind(number)
            .bind(company_id)
            .bind(request.subtotal)
            .bind(request.tax)
            .bind(request.tax_percent)
            .bind(&request.tax_name)
            .bind(request.total_after_tax)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| write_error("add sale return", "sale return number already used", e))?;

        if request.cash_out > Decimal::ZERO {
            insert_cash_entry(
                &mut tx,
                &CashEntry::cash_out(
                    company_id,
                    request.cash_out,
                    created_at,
                    CashSource::SaleReturn(sale_return.sale_return_id),
                ),
            )
            .await?;
        }

        let mut items = Vec::with_capacity(request.items.len());
        for item in &request.items {
            items.push(insert_item(&mut tx, &sale_return, item).await?);
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit sale return: {}", e))
        })?;

        info!(
            sale_return_id = sale_return.sale_return_id,
            sale_return_number = sale_return.sale_return_number,
            "Sale return created"
        );
        Ok((sale_return, items))
    }

    async fn sale_return_items(
        &self,
        company_id: i64,
        sale_return_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<SaleReturnItem>>, AppError> {
        let sql = format!(
            "SELECT {RETURN_ITEM_COLUMNS} FROM sale_return_items WHERE company_id = $1 AND sale_return_id = ANY($2) ORDER BY sale_return_id, item_id"
        );
        let rows = sqlx::query_as::<_, SaleReturnItem>(&sql)
            .bind(company_id)
            .bind(sale_return_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to load sale return items: {}", e))
            })?;

        let mut grouped: HashMap<i64, Vec<SaleReturnItem>> = HashMap::new();
        for row in rows {
            grouped.entry(row.sale_return_id).or_default().push(row);
        }
        Ok(grouped)
    }
}

async fn insert_item(
    conn: &mut PgConnection,
    sale_return: &SaleReturn,
    item: &SaleItemRequest,
) -> Result<SaleReturnItem, AppError> {
    let sql = format!(
        r#"
        INSERT INTO sale_return_items (sale_return_id, item_id, item_name, company_id, unit_id, unit_name, units_sold, price_per_unit, subtotal, tax, tax_percent, total_after_tax, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
        RETURNING {RETURN_ITEM_COLUMNS}
        "#
    );
    sqlx::query_as::<_, SaleReturnItem>(&sql)
        .bind(sale_return.sale_return_id)
        .bind(item.item_id)
        .bind(&item.item_name)
        .bind(sale_return.company_id)
        .bind(item.unit_id)
        .bind(&item.unit_name)
        .bind(item.units_sold)
        .bind(item.price_per_unit)
        .bind(item.subtotal)
        .bind(item.tax)
        .bind(item.tax_percent)
        .bind(item.total_after_tax)
        .bind(sale_return.created_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| write_error("add sale return item", "duplicate itemId in items", e))
}
