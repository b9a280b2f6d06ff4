use super::{next_number, write_error, Database};
use crate::dtos::items::SaleItemRequest;
use crate::dtos::quotation::{QuotationCursor, QuotationFields};
use crate::models::{fetch_limit, ListQuotationsFilter, Quotation, QuotationItem};
use crate::services::metrics::start_db_timer;
use crate::services::reconcile::{ensure_unique_item_ids, reconcile};
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument};

const QUOTATION_COLUMNS: &str = "quotation_id, created_at, updated_at, quotation_number, company_id, party_id, party_name, created_by, subtotal, discount, total_after_discount, tax, tax_percent, tax_name, total_after_tax, sale_id";

const QUOTATION_ITEM_COLUMNS: &str = "quotation_id, item_id, item_name, company_id, unit_id, unit_name, units_sold, price_per_unit, subtotal, tax, tax_percent, total_after_tax, created_at, updated_at";

const DUPLICATE_QUOTATION: &str = "quotation number already used";

impl Database {
    #[instrument(skip(self, filter, cursor), fields(company_id = %company_id))]
    pub async fn list_quotations(
        &self,
        company_id: i64,
        page_size: i64,
        filter: &ListQuotationsFilter,
        cursor: Option<&QuotationCursor>,
    ) -> Result<Vec<Quotation>, AppError> {
        let _timer = start_db_timer("list_quotations");

        let (from, to) = filter.created_between.unzip();
        let sql = format!(
            r#"
            SELECT {QUOTATION_COLUMNS}
            FROM quotations
            WHERE company_id = $1
              AND ($2::bigint IS NULL OR party_id = $2)
              AND ($3::timestamptz IS NULL OR created_at BETWEEN $3 AND $4)
              AND ($5::bigint IS NULL OR quotation_number = $5)
              AND ($6::timestamptz IS NULL OR updated_at < $6 OR (updated_at = $6 AND quotation_id > $7))
            ORDER BY updated_at DESC, quotation_id ASC
            LIMIT $8
            "#
        );

        sqlx::query_as::<_, Quotation>(&sql)
            .bind(company_id)
            .bind(filter.party_id)
            .bind(from)
            .bind(to)
            .bind(filter.quotation_number)
            .bind(cursor.map(|c| c.updated_at))
            .bind(cursor.map(|c| c.quotation_id))
            .bind(fetch_limit(page_size))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list quotations: {}", e)))
    }

    #[instrument(skip(self), fields(company_id = %company_id, quotation_id = %quotation_id))]
    pub async fn get_quotation(
        &self,
        company_id: i64,
        quotation_id: i64,
    ) -> Result<Option<(Quotation, Vec<QuotationItem>)>, AppError> {
        let _timer = start_db_timer("get_quotation");

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to acquire connection: {}", e)))?;

        let Some(quotation) = load_quotation(&mut conn, company_id, quotation_id, false).await? else {
            return Ok(None);
        };
        let items = load_items(&mut conn, company_id, quotation_id, false).await?;

        Ok(Some((quotation, items)))
    }

    /// Record a quotation and its lines. Quotations move no stock.
    #[instrument(skip(self, fields), fields(company_id = %fields.company_id))]
    pub async fn add_quotation(
        &self,
        created_at: DateTime<Utc>,
        quotation_number: Option<i64>,
        fields: &QuotationFields,
    ) -> Result<(Quotation, Vec<QuotationItem>), AppError> {
        let _timer = start_db_timer("add_quotation");
        ensure_unique_item_ids(&fields.items)?;
        let company_id = fields.company_id;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e)))?;

        let quotation_number = match quotation_number {
            Some(number) => number,
            None => next_number(&mut tx, "quotations", "quotation_number", company_id).await?,
        };

        let sql = format!(
            r#"
            INSERT INTO quotations (created_at, updated_at, quotation_number, company_id, party_id, party_name, created_by, subtotal, discount, total_after_discount, tax, tax_percent, tax_name, total_after_tax)
            VALUES ($1, $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {QUOTATION_COLUMNS}
            "#
        );
        let quotation = sqlx::query_as::<_, Quotation>(&sql)
            .bind(created_at)
            .bind(quotation_number)
            .bind(company_id)
            .bind(fields.party_id)
            .bind(&fields.party_name)
            .bind(&fields.created_by)
            .bind(fields.subtotal)
            .bind(fields.discount)
            .bind(fields.total_after_discount)
            .bind(fields.tax)
            .bind(fields.tax_percent)
            .bind(&fields.tax_name)
            .bind(fields.total_after_tax)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| write_error("add quotation", DUPLICATE_QUOTATION, e))?;

        let mut items = Vec::with_capacity(fields.items.len());
        for item in &fields.items {
            items.push(insert_item(&mut tx, &quotation, item).await?);
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to commit quotation: {}", e)))?;

        info!(
            quotation_id = quotation.quotation_id,
            quotation_number = quotation.quotation_number,
            "Quotation created"
        );
        Ok((quotation, items))
    }

    /// Overwrite a quotation and reconcile its lines. A quotation that has
    /// been converted into a sale is frozen (409).
    #[instrument(skip(self, fields), fields(company_id = %fields.company_id, quotation_id = %quotation_id))]
    pub async fn update_quotation(
        &self,
        quotation_id: i64,
        fields: &QuotationFields,
    ) -> Result<Option<(Quotation, Vec<QuotationItem>)>, AppError> {
        let _timer = start_db_timer("update_quotation");
        let company_id = fields.company_id;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e)))?;

        let Some(stored) = load_quotation(&mut tx, company_id, quotation_id, true).await? else {
            return Ok(None);
        };
        if stored.is_converted() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "quotation {} has already been converted to a sale",
                stored.quotation_number
            )));
        }

        let stored_items = load_items(&mut tx, company_id, quotation_id, true).await?;
        let changes = reconcile(stored_items, fields.items.clone())?;

        let sql = format!(
            r#"
            UPDATE quotations
            SET party_id = $3,
                party_name = $4,
                created_by = $5,
                subtotal = $6,
                discount = $7,
                total_after_discount = $8,
                tax = $9,
                tax_percent = $10,
                tax_name = $11,
                total_after_tax = $12,
                updated_at = NOW()
            WHERE company_id = $1 AND quotation_id = $2
            RETURNING {QUOTATION_COLUMNS}
            "#
        );
        let quotation = sqlx::query_as::<_, Quotation>(&sql)
            .bind(company_id)
            .bind(quotation_id)
            .bind(fields.party_id)
            .bind(&fields.party_name)
            .bind(&fields.created_by)
            .bind(fields.subtotal)
            .bind(fields.discount)
            .bind(fields.total_after_discount)
            .bind(fields.tax)
            .bind(fields.tax_percent)
            .bind(&fields.tax_name)
            .bind(fields.total_after_tax)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| write_error("update quotation", DUPLICATE_QUOTATION, e))?;

        for item in &changes.added {
            insert_item(&mut tx, &quotation, item).await?;
        }
        for update in &changes.updated {
            update_item(&mut tx, &quotation, &update.new).await?;
        }
        for item in &changes.removed {
            sqlx::query("DELETE FROM quotation_items WHERE quotation_id = $1 AND item_id = $2")
                .bind(quotation_id)
                .bind(item.item_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to remove quotation item: {}", e))
                })?;
        }

        let items = load_items(&mut tx, company_id, quotation_id, false).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to commit quotation: {}", e)))?;

        info!(
            added = changes.added.len(),
            updated = changes.updated.len(),
            removed = changes.removed.len(),
            "Quotation updated"
        );
        Ok(Some((quotation, items)))
    }
}

async fn load_quotation(
    conn: &mut PgConnection,
    company_id: i64,
    quotation_id: i64,
    for_update: bool,
) -> Result<Option<Quotation>, AppError> {
    let sql = format!(
        "SELECT {QUOTATION_COLUMNS} FROM quotations WHERE company_id = $1 AND quotation_id = $2{}",
        if for_update { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as::<_, Quotation>(&sql)
        .bind(company_id)
        .bind(quotation_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get quotation: {}", e)))
}

async fn load_items(
    conn: &mut PgConnection,
    company_id: i64,
    quotation_id: i64,
    for_update: bool,
) -> Result<Vec<QuotationItem>, AppError> {
    let sql = format!(
        "SELECT {QUOTATION_ITEM_COLUMNS} FROM quotation_items WHERE company_id = $1 AND quotation_id = $2 ORDER BY item_id{}",
        if for_update { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as::<_, QuotationItem>(&sql)
        .bind(company_id)
        .bind(quotation_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load quotation items: {}", e)))
}

async fn insert_item(
    conn: &mut PgConnection,
    quotation: &Quotation,
    item: &SaleItemRequest,
) -> Result<QuotationItem, AppError> {
    let sql = format!(
        r#"
        INSERT INTO quotation_items (quotation_id, item_id, item_name, company_id, unit_id, unit_name, units_sold, price_per_unit, subtotal, tax, tax_percent, total_after_tax, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
        RETURNING {QUOTATION_ITEM_COLUMNS}
        "#
    );
    sqlx::query_as::<_, QuotationItem>(&sql)
        .bind(quotation.quotation_id)
        .bind(item.item_id)
        .bind(&item.item_name)
        .bind(quotation.company_id)
        .bind(item.unit_id)
        .bind(&item.unit_name)
        .bind(item.units_sold)
        .bind(item.price_per_unit)
        .bind(item.subtotal)
        .bind(item.tax)
        .bind(item.tax_percent)
        .bind(item.total_after_tax)
        .bind(quotation.updated_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| write_error("add quotation item", "quotation already has a line for this item", e))
}

async fn update_item(
    conn: &mut PgConnection,
    quotation: &Quotation,
    item: &SaleItemRequest,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE quotation_items
        SET item_name = $3,
            unit_id = $4,
            unit_name = $5,
            units_sold = $6,
            price_per_unit = $7,
            subtotal = $8,
            tax = $9,
            tax_percent = $10,
            total_after_tax = $11,
            updated_at = $12
        WHERE quotation_id = $1 AND item_id = $2
        "#,
    )
    .bind(quotation.quotation_id)
    .bind(item.item_id)
    .bind(&item.item_name)
    .bind(item.unit_id)
    .bind(&item.unit_name)
    .bind(item.units_sold)
    .bind(item.price_per_unit)
    .bind(item.subtotal)
    .bind(item.tax)
    .bind(item.tax_percent)
    .bind(item.total_after_tax)
    .bind(quotation.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update quotation item: {}", e)))?;

    Ok(())
}
