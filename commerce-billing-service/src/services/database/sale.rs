use super::{insert_cash_entry, next_number, write_error, Database};
use crate::dtos::items::SaleItemRequest;
use crate::dtos::sale::{SaleCursor, SaleFields};
use crate::models::{fetch_limit, CashEntry, CashSource, ListInvoicesFilter, Sale, SaleItem};
use crate::services::inventory::{InventorySync, ItemsChanged, RecordSale, RecordSaleUpdate, SoldItem};
use crate::services::metrics::start_db_timer;
use crate::services::reconcile::{ensure_unique_item_ids, reconcile};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument};

const SALE_COLUMNS: &str = "sale_id, created_at, updated_at, invoice_number, company_id, party_id, party_name, is_no_party_bill, done_by, subtotal, discount, total_after_discount, tax, tax_percent, tax_name, company_tax_number, party_tax_number, total_after_tax, is_credit, payment_due_date, amount_paid, amount_due, is_fully_paid, payment_completion_date";

const SALE_ITEM_COLUMNS: &str = "sale_id, item_id, item_name, company_id, unit_id, unit_name, units_sold, price_per_unit, subtotal, tax, tax_percent, total_after_tax, created_at, updated_at";

const DUPLICATE_INVOICE: &str = "invoice number already used";

impl Database {
    /// One page of a company's sales, most recently updated first.
    #[instrument(skip(self, filter, cursor), fields(company_id = %company_id))]
    pub async fn list_sales(
        &self,
        company_id: i64,
        page_size: i64,
        filter: &ListInvoicesFilter,
        cursor: Option<&SaleCursor>,
    ) -> Result<Vec<Sale>, AppError> {
        let _timer = start_db_timer("list_sales");

        let (from, to) = filter.created_between.unzip();
        let sql = format!(
            r#"
            SELECT {SALE_COLUMNS}
            FROM sales
            WHERE company_id = $1
              AND ($2::bigint IS NULL OR party_id = $2)
              AND ($3::bool IS NULL OR is_credit = $3)
              AND ($4::timestamptz IS NULL OR created_at BETWEEN $4 AND $5)
              AND ($6::bool = FALSE OR (is_fully_paid = FALSE AND payment_due_date <= (NOW() AT TIME ZONE 'UTC')::date))
              AND ($7::bigint IS NULL OR invoice_number = $7)
              AND ($8::timestamptz IS NULL OR updated_at < $8 OR (updated_at = $8 AND sale_id > $9))
            ORDER BY updated_at DESC, sale_id ASC
            LIMIT $10
            "#
        );

        sqlx::query_as::<_, Sale>(&sql)
            .bind(company_id)
            .bind(filter.party_id)
            .bind(filter.payment_type.is_credit())
            .bind(from)
            .bind(to)
            .bind(filter.only_overdue)
            .bind(filter.invoice_number)
            .bind(cursor.map(|c| c.updated_at))
            .bind(cursor.map(|c| c.sale_id))
            .bind(fetch_limit(page_size))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list sales: {}", e)))
    }

    #[instrument(skip(self), fields(company_id = %company_id, sale_id = %sale_id))]
    pub async fn get_sale(
        &self,
        company_id: i64,
        sale_id: i64,
    ) -> Result<Option<(Sale, Vec<SaleItem>)>, AppError> {
        let _timer = start_db_timer("get_sale");

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to acquire connection: {}", e)))?;

        let Some(sale) = load_sale(&mut conn, company_id, sale_id, false).await? else {
            return Ok(None);
        };
        let items = load_items(&mut conn, company_id, sale_id, false).await?;

        Ok(Some((sale, items)))
    }

    /// Record a sale with its payment and lines, convert the quotation it was
    /// made from (if any), then report the stock handed out. Nothing is
    /// committed unless the inventory service accepts it.
    #[instrument(skip(self, fields, inventory, request_id), fields(company_id = %fields.company_id))]
    pub async fn add_sale(
        &self,
        created_at: DateTime<Utc>,
        quotation_number: Option<i64>,
        fields: &SaleFields,
        inventory: &dyn InventorySync,
        request_id: Option<&str>,
    ) -> Result<(Sale, Vec<SaleItem>), AppError> {
        let _timer = start_db_timer("add_sale");
        ensure_unique_item_ids(&fields.items)?;
        let company_id = fields.company_id;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e)))?;

        let invoice_number = match fields.invoice_number {
            Some(number) => number,
            None => next_number(&mut tx, "sales", "invoice_number", company_id).await?,
        };

        let sql = format!(
            r#"
            INSERT INTO sales (created_at, updated_at, invoice_number, company_id, party_id, party_name, is_no_party_bill, done_by, subtotal, discount, total_after_discount, tax, tax_percent, tax_name, company_tax_number, party_tax_number, total_after_tax, is_credit, payment_due_date, amount_paid, amount_due, is_fully_paid, payment_completion_date)
            VALUES ($1, $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
            RETURNING {SALE_COLUMNS}
            "#
        );
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(created_at)
            .bind(invoice_number)
            .bind(company_id)
            .bind(fields.party_id)
            .bind(&fields.party_name)
            .bind(fields.is_no_party_bill)
            .bind(&fields.done_by)
            .bind(fields.subtotal)
            .bind(fields.discount)
            .bind(fields.total_after_discount)
            .bind(fields.tax)
            .bind(fields.tax_percent)
            .bind(&fields.tax_name)
            .bind(&fields.company_tax_number)
            .bind(&fields.party_tax_number)
            .bind(fields.total_after_tax)
            .bind(fields.is_credit)
            .bind(fields.payment_due_date)
            .bind(fields.amount_paid)
            .bind(fields.amount_due)
            .bind(fields.is_fully_paid)
            .bind(fields.payment_completion_date)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| write_error("add sale", DUPLICATE_INVOICE, e))?;

        if let Some(number) = quotation_number {
            convert_quotation(&mut tx, company_id, number, sale.sale_id).await?;
        }

        if fields.amount_paid > Decimal::ZERO {
            insert_cash_entry(
                &mut tx,
                &CashEntry::cash_in(
                    company_id,
                    fields.amount_paid,
                    created_at,
                    CashSource::Sale(sale.sale_id),
                ),
            )
            .await?;
        }

        let mut items = Vec::with_capacity(fields.items.len());
        for item in &fields.items {
            items.push(insert_item(&mut tx, &sale, item).await?);
        }

        if !fields.items.is_empty() {
            inventory
                .record_sale(
                    &RecordSale {
                        company_id,
                        sale_id: sale.sale_id,
                        items: fields.items.iter().map(SoldItem::from).collect(),
                    },
                    request_id,
                )
                .await?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to commit sale: {}", e)))?;

        info!(
            sale_id = sale.sale_id,
            invoice_number = sale.invoice_number,
            items = items.len(),
            "Sale created"
        );
        Ok((sale, items))
    }

    /// Overwrite a sale and reconcile its lines, as for purchases but with
    /// the payment difference recorded as cash in.
    #[instrument(skip(self, fields, inventory, request_id), fields(company_id = %fields.company_id, sale_id = %sale_id))]
    pub async fn update_sale(
        &self,
        sale_id: i64,
        fields: &SaleFields,
        inventory: &dyn InventorySync,
        request_id: Option<&str>,
    ) -> Result<Option<(Sale, Vec<SaleItem>)>, AppError> {
        let _timer = start_db_timer("update_sale");
        let company_id = fields.company_id;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e)))?;

        let Some(stored) = load_sale(&mut tx, company_id, sale_id, true).await? else {
            return Ok(None);
        };
        let stored_items = load_items(&mut tx, company_id, sale_id, true).await?;
        let changes = reconcile(stored_items, fields.items.clone())?;

        let sql = format!(
            r#"
            UPDATE sales
            SET invoice_number = COALESCE($3, invoice_number),
                party_id = $4,
                party_name = $5,
                is_no_party_bill = $6,
                done_by = $7,
                subtotal = $8,
                discount = $9,
                total_after_discount = $10,
                tax = $11,
                tax_percent = $12,
                tax_name = $13,
                company_tax_number = $14,
                party_tax_number = $15,
                total_after_tax = $16,
                is_credit = $17,
                payment_due_date = $18,
                amount_paid = $19,
                amount_due = $20,
                is_fully_paid = $21,
                payment_completion_date = $22,
                updated_at = NOW()
            WHERE company_id = $1 AND sale_id = $2
            RETURNING {SALE_COLUMNS}
            "#
        );
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(company_id)
            .bind(sale_id)
            .bind(fields.invoice_number)
            .bind(fields.party_id)
            .bind(&fields.party_name)
            .bind(fields.is_no_party_bill)
            .bind(&fields.done_by)
            .bind(fields.subtotal)
            .bind(fields.discount)
            .bind(fields.total_after_discount)
            .bind(fields.tax)
            .bind(fields.tax_percent)
            .bind(&fields.tax_name)
            .bind(&fields.company_tax_number)
            .bind(&fields.party_tax_number)
            .bind(fields.total_after_tax)
            .bind(fields.is_credit)
            .bind(fields.payment_due_date)
            .bind(fields.amount_paid)
            .bind(fields.amount_due)
            .bind(fields.is_fully_paid)
            .bind(fields.payment_completion_date)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| write_error("update sale", DUPLICATE_INVOICE, e))?;

        let paid_delta = fields.amount_paid - stored.amount_paid;
        if !paid_delta.is_zero() {
            insert_cash_entry(
                &mut tx,
                &CashEntry::cash_in(company_id, paid_delta, sale.updated_at, CashSource::Sale(sale_id)),
            )
            .await?;
        }

        for item in &changes.added {
            insert_item(&mut tx, &sale, item).await?;
        }
        for update in &changes.updated {
            update_item(&mut tx, &sale, &update.new).await?;
        }
        for item in &changes.removed {
            sqlx::query("DELETE FROM sale_items WHERE sale_id = $1 AND item_id = $2")
                .bind(sale_id)
                .bind(item.item_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to remove sale item: {}", e))
                })?;
        }

        info!(
            added = changes.added.len(),
            updated = changes.updated.len(),
            removed = changes.removed.len(),
            unchanged = changes.unchanged,
            "Sale items reconciled"
        );

        if !changes.added.is_empty() {
            inventory
                .record_sale(
                    &RecordSale {
                        company_id,
                        sale_id,
                        items: changes.added.iter().map(SoldItem::from).collect(),
                    },
                    request_id,
                )
                .await?;
        }
        let items_changed = ItemsChanged::<SoldItem>::from_changes(&changes);
        if !items_changed.is_empty() {
            inventory
                .record_sale_update(
                    &RecordSaleUpdate {
                        company_id,
                        sale_id,
                        items: items_changed,
                    },
                    request_id,
                )
                .await?;
        }

        let items = load_items(&mut tx, company_id, sale_id, false).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to commit sale: {}", e)))?;

        info!("Sale updated");
        Ok(Some((sale, items)))
    }
}

async fn load_sale(
    conn: &mut PgConnection,
    company_id: i64,
    sale_id: i64,
    for_update: bool,
) -> Result<Option<Sale>, AppError> {
    let sql = format!(
        "SELECT {SALE_COLUMNS} FROM sales WHERE company_id = $1 AND sale_id = $2{}",
        if for_update { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as::<_, Sale>(&sql)
        .bind(company_id)
        .bind(sale_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get sale: {}", e)))
}

async fn load_items(
    conn: &mut PgConnection,
    company_id: i64,
    sale_id: i64,
    for_update: bool,
) -> Result<Vec<SaleItem>, AppError> {
    let sql = format!(
        "SELECT {SALE_ITEM_COLUMNS} FROM sale_items WHERE company_id = $1 AND sale_id = $2 ORDER BY item_id{}",
        if for_update { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as::<_, SaleItem>(&sql)
        .bind(company_id)
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load sale items: {}", e)))
}

/// Point the company's quotation `quotation_number` at the new sale.
/// Unknown quotations are a 404, already converted ones a 409.
async fn convert_quotation(
    conn: &mut PgConnection,
    company_id: i64,
    quotation_number: i64,
    sale_id: i64,
) -> Result<(), AppError> {
    let linked = sqlx::query_scalar::<_, Option<i64>>(
        "SELECT sale_id FROM quotations WHERE company_id = $1 AND quotation_number = $2 FOR UPDATE",
    )
    .bind(company_id)
    .bind(quotation_number)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock quotation: {}", e)))?;

    let Some(linked) = linked else {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "quotation {} not found",
            quotation_number
        )));
    };
    if let Some(existing) = linked {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "quotation {} already converted to sale {}",
            quotation_number,
            existing
        )));
    }

    sqlx::query(
        "UPDATE quotations SET sale_id = $3, updated_at = NOW() WHERE company_id = $1 AND quotation_number = $2",
    )
    .bind(company_id)
    .bind(quotation_number)
    .bind(sale_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to convert quotation: {}", e)))?;

    info!(quotation_number, sale_id, "Quotation converted to sale");
    Ok(())
}

async fn insert_item(
    conn: &mut PgConnection,
    sale: &Sale,
    item: &SaleItemRequest,
) -> Result<SaleItem, AppError> {
    let sql = format!(
        r#"
        INSERT INTO sale_items (sale_id, item_id, item_name, company_id, unit_id, unit_name, units_sold, price_per_unit, subtotal, tax, tax_percent, total_after_tax, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
        RETURNING {SALE_ITEM_COLUMNS}
        "#
    );
    sqlx::query_as::<_, SaleItem>(&sql)
        .bind(sale.sale_id)
        .bind(item.item_id)
        .bind(&item.item_name)
        .bind(sale.company_id)
        .bind(item.unit_id)
        .bind(&item.unit_name)
        .bind(item.units_sold)
        .bind(item.price_per_unit)
        .bind(item.subtotal)
        .bind(item.tax)
        .bind(item.tax_percent)
        .bind(item.total_after_tax)
        .bind(sale.updated_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| write_error("add sale item", "sale already has a line for this item", e))
}

async fn update_item(conn: &mut PgConnection, sale: &Sale, item: &SaleItemRequest) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE sale_items
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
        WHERE sale_id = $1 AND item_id = $2
        "#,
    )
    .bind(sale.sale_id)
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
    .bind(sale.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update sale item: {}", e)))?;

    Ok(())
}
