use super::{insert_cash_entry, write_error, Database};
use crate::dtos::items::PurchaseItemRequest;
use crate::dtos::purchase::{PurchaseCursor, PurchaseFields};
use crate::models::{
    fetch_limit, CashEntry, CashSource, ListInvoicesFilter, Purchase, PurchaseItem,
};
use crate::services::inventory::{
    InventorySync, ItemsChanged, PurchasedItem, RecordPurchase, RecordPurchaseUpdate,
};
use crate::services::metrics::start_db_timer;
use crate::services::reconcile::{ensure_unique_item_ids, reconcile};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument};

const PURCHASE_COLUMNS: &str = "purchase_id, created_at, updated_at, invoice_number, company_id, party_id, party_name, subtotal, discount, total_after_discount, tax, tax_percent, tax_name, total_after_tax, is_credit, payment_due_date, amount_paid, amount_due, is_fully_paid, payment_completion_date, receipt_number";

const PURCHASE_ITEM_COLUMNS: &str = "purchase_id, item_id, item_name, company_id, unit_id, unit_name, units_purchased, price_per_unit, subtotal, tax, tax_percent, total_after_tax, created_at, updated_at";

const DUPLICATE_ITEM: &str = "purchase already has a line for this item";

impl Database {
    /// One page of a company's purchases, most recently updated first.
    #[instrument(skip(self, filter, cursor), fields(company_id = %company_id))]
    pub async fn list_purchases(
        &self,
        company_id: i64,
        page_size: i64,
        filter: &ListInvoicesFilter,
        cursor: Option<&PurchaseCursor>,
    ) -> Result<Vec<Purchase>, AppError> {
        let _timer = start_db_timer("list_purchases");

        let (from, to) = filter.created_between.unzip();
        let sql = format!(
            r#"
            SELECT {PURCHASE_COLUMNS}
            FROM purchases
            WHERE company_id = $1
              AND ($2::bigint IS NULL OR party_id = $2)
              AND ($3::bool IS NULL OR is_credit = $3)
              AND ($4::timestamptz IS NULL OR created_at BETWEEN $4 AND $5)
              AND ($6::bool = FALSE OR (is_fully_paid = FALSE AND payment_due_date <= (NOW() AT TIME ZONE 'UTC')::date))
              AND ($7::bigint IS NULL OR invoice_number = $7)
              AND ($8::timestamptz IS NULL OR updated_at < $8 OR (updated_at = $8 AND purchase_id > $9))
            ORDER BY updated_at DESC, purchase_id ASC
            LIMIT $10
            "#
        );

        sqlx::query_as::<_, Purchase>(&sql)
            .bind(company_id)
            .bind(filter.party_id)
            .bind(filter.payment_type.is_credit())
            .bind(from)
            .bind(to)
            .bind(filter.only_overdue)
            .bind(filter.invoice_number)
            .bind(cursor.map(|c| c.updated_at))
            .bind(cursor.map(|c| c.purchase_id))
            .bind(fetch_limit(page_size))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list purchases: {}", e)))
    }

    /// A purchase with its lines, or `None` when the company has no such purchase.
    #[instrument(skip(self), fields(company_id = %company_id, purchase_id = %purchase_id))]
    pub async fn get_purchase(
        &self,
        company_id: i64,
        purchase_id: i64,
    ) -> Result<Option<(Purchase, Vec<PurchaseItem>)>, AppError> {
        let _timer = start_db_timer("get_purchase");

        let sql = format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE company_id = $1 AND purchase_id = $2"
        );
        let purchase = sqlx::query_as::<_, Purchase>(&sql)
            .bind(company_id)
            .bind(purchase_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get purchase: {}", e)))?;

        let Some(purchase) = purchase else {
            return Ok(None);
        };

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to acquire connection: {}", e)))?;
        let items = load_items(&mut conn, company_id, purchase_id, false).await?;

        Ok(Some((purchase, items)))
    }

    /// Record a purchase, its payment and its lines, then report the stock
    /// received. Nothing is committed unless the inventory service accepts it.
    #[instrument(skip(self, fields, inventory, request_id), fields(company_id = %fields.company_id))]
    pub async fn add_purchase(
        &self,
        created_at: DateTime<Utc>,
        fields: &PurchaseFields,
        inventory: &dyn InventorySync,
        request_id: Option<&str>,
    ) -> Result<(Purchase, Vec<PurchaseItem>), AppError> {
        let _timer = start_db_timer("add_purchase");
        ensure_unique_item_ids(&fields.items)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e)))?;

        let sql = format!(
            r#"
            INSERT INTO purchases (created_at, updated_at, invoice_number, company_id, party_id, party_name, subtotal, discount, total_after_discount, tax, tax_percent, tax_name, total_after_tax, is_credit, payment_due_date, amount_paid, amount_due, is_fully_paid, payment_completion_date, receipt_number)
            VALUES ($1, $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            RETURNING {PURCHASE_COLUMNS}
            "#
        );
        let purchase = sqlx::query_as::<_, Purchase>(&sql)
            .bind(created_at)
            .bind(fields.invoice_number)
            .bind(fields.company_id)
            .bind(fields.party_id)
            .bind(&fields.party_name)
            .bind(fields.subtotal)
            .bind(fields.discount)
            .bind(fields.total_after_discount)
            .bind(fields.tax)
            .bind(fields.tax_percent)
            .bind(&fields.tax_name)
            .bind(fields.total_after_tax)
            .bind(fields.is_credit)
            .bind(fields.payment_due_date)
            .bind(fields.amount_paid)
            .bind(fields.amount_due)
            .bind(fields.is_fully_paid)
            .bind(fields.payment_completion_date)
            .bind(&fields.receipt_number)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| write_error("add purchase", "purchase already exists", e))?;

        if fields.amount_paid > Decimal::ZERO {
            insert_cash_entry(
                &mut tx,
                &CashEntry::cash_out(
                    fields.company_id,
                    fields.amount_paid,
                    created_at,
                    CashSource::Purchase(purchase.purchase_id),
                ),
            )
            .await?;
        }

        let mut items = Vec::with_capacity(fields.items.len());
        for item in &fields.items {
            items.push(insert_item(&mut tx, &purchase, item).await?);
        }

        if !fields.items.is_empty() {
            inventory
                .record_purchase(
                    &RecordPurchase {
                        company_id: purchase.company_id,
                        purchase_id: purchase.purchase_id,
                        items: fields.items.iter().map(PurchasedItem::from).collect(),
                    },
                    request_id,
                )
                .await?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to commit purchase: {}", e)))?;

        info!(purchase_id = purchase.purchase_id, items = items.len(), "Purchase created");
        Ok((purchase, items))
    }

    /// Overwrite a purchase and reconcile its lines against the stored ones.
    ///
    /// The stored header and lines are locked for the duration of the
    /// transaction; the payment difference goes to the cash journal and the
    /// line changes to the inventory service. Returns `None` when the company
    /// has no such purchase.
    #[instrument(skip(self, fields, inventory, request_id), fields(company_id = %fields.company_id, purchase_id = %purchase_id))]
    pub async fn update_purchase(
        &self,
        purchase_id: i64,
        fields: &PurchaseFields,
        inventory: &dyn InventorySync,
        request_id: Option<&str>,
    ) -> Result<Option<(Purchase, Vec<PurchaseItem>)>, AppError> {
        let _timer = start_db_timer("update_purchase");
        let company_id = fields.company_id;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e)))?;

        let stored_amount_paid = sqlx::query_scalar::<_, Decimal>(
            "SELECT amount_paid FROM purchases WHERE company_id = $1 AND purchase_id = $2 FOR UPDATE",
        )
        .bind(company_id)
        .bind(purchase_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock purchase: {}", e)))?;

        let Some(stored_amount_paid) = stored_amount_paid else {
            return Ok(None);
        };

        let stored_items = load_items(&mut tx, company_id, purchase_id, true).await?;
        let changes = reconcile(stored_items, fields.items.clone())?;

        let sql = format!(
            r#"
            UPDATE purchases
            SET invoice_number = $3,
                party_id = $4,
                party_name = $5,
                subtotal = $6,
                discount = $7,
                total_after_discount = $8,
                tax = $9,
                tax_percent = $10,
                tax_name = $11,
                total_after_tax = $12,
                is_credit = $13,
                payment_due_date = $14,
                amount_paid = $15,
                amount_due = $16,
                is_fully_paid = $17,
                payment_completion_date = $18,
                receipt_number = $19,
                updated_at = NOW()
            WHERE company_id = $1 AND purchase_id = $2
            RETURNING {PURCHASE_COLUMNS}
            "#
        );
        let purchase = sqlx::query_as::<_, Purchase>(&sql)
            .bind(company_id)
            .bind(purchase_id)
            .bind(fields.invoice_number)
            .bind(fields.party_id)
            .bind(&fields.party_name)
            .bind(fields.subtotal)
            .bind(fields.discount)
            .bind(fields.total_after_discount)
            .bind(fields.tax)
            .bind(fields.tax_percent)
            .bind(&fields.tax_name)
            .bind(fields.total_after_tax)
            .bind(fields.is_credit)
            .bind(fields.payment_due_date)
            .bind(fields.amount_paid)
            .bind(fields.amount_due)
            .bind(fields.is_fully_paid)
            .bind(fields.payment_completion_date)
            .bind(&fields.receipt_number)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| write_error("update purchase", "purchase already exists", e))?;

        let paid_delta = fields.amount_paid - stored_amount_paid;
        if !paid_delta.is_zero() {
            insert_cash_entry(
                &mut tx,
                &CashEntry::cash_out(
                    company_id,
                    paid_delta,
                    purchase.updated_at,
                    CashSource::Purchase(purchase_id),
                ),
            )
            .await?;
        }

        for item in &changes.added {
            insert_item(&mut tx, &purchase, item).await?;
        }
        for update in &changes.updated {
            update_item(&mut tx, &purchase, &update.new).await?;
        }
        for item in &changes.removed {
            sqlx::query("DELETE FROM purchase_items WHERE purchase_id = $1 AND item_id = $2")
                .bind(purchase_id)
                .bind(item.item_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to remove purchase item: {}", e))
                })?;
        }

        info!(
            added = changes.added.len(),
            updated = changes.updated.len(),
            removed = changes.removed.len(),
            unchanged = changes.unchanged,
            "Purchase items reconciled"
        );

        if !changes.added.is_empty() {
            inventory
                .record_purchase(
                    &RecordPurchase {
                        company_id,
                        purchase_id,
                        items: changes.added.iter().map(PurchasedItem::from).collect(),
                    },
                    request_id,
                )
                .await?;
        }
        let items_changed = ItemsChanged::<PurchasedItem>::from_changes(&changes);
        if !items_changed.is_empty() {
            inventory
                .record_purchase_update(
                    &RecordPurchaseUpdate {
                        company_id,
                        purchase_id,
                        items: items_changed,
                    },
                    request_id,
                )
                .await?;
        }

        let items = load_items(&mut tx, company_id, purchase_id, false).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to commit purchase: {}", e)))?;

        info!("Purchase updated");
        Ok(Some((purchase, items)))
    }
}

async fn load_items(
    conn: &mut PgConnection,
    company_id: i64,
    purchase_id: i64,
    for_update: bool,
) -> Result<Vec<PurchaseItem>, AppError> {
    let sql = format!(
        "SELECT {PURCHASE_ITEM_COLUMNS} FROM purchase_items WHERE company_id = $1 AND purchase_id = $2 ORDER BY item_id{}",
        if for_update { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as::<_, PurchaseItem>(&sql)
        .bind(company_id)
        .bind(purchase_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load purchase items: {}", e)))
}

async fn insert_item(
    conn: &mut PgConnection,
    purchase: &Purchase,
    item: &PurchaseItemRequest,
) -> Result<PurchaseItem, AppError> {
    let sql = format!(
        r#"
        INSERT INTO purchase_items (purchase_id, item_id, item_name, company_id, unit_id, unit_name, units_purchased, price_per_unit, subtotal, tax, tax_percent, total_after_tax, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
        RETURNING {PURCHASE_ITEM_COLUMNS}
        "#
    );
    sqlx::query_as::<_, PurchaseItem>(&sql)
        .bind(purchase.purchase_id)
        .bind(item.item_id)
        .bind(&item.item_name)
        .bind(purchase.company_id)
        .bind(item.unit_id)
        .bind(&item.unit_name)
        .bind(item.units_purchased)
        .bind(item.price_per_unit)
        .bind(item.subtotal)
        .bind(item.tax)
        .bind(item.tax_percent)
        .bind(item.total_after_tax)
        .bind(purchase.updated_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| write_error("add purchase item", DUPLICATE_ITEM, e))
}

async fn update_item(
    conn: &mut PgConnection,
    purchase: &Purchase,
    item: &PurchaseItemRequest,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE purchase_items
        SET item_name = $3,
            unit_id = $4,
            unit_name = $5,
            units_purchased = $6,
            price_per_unit = $7,
            subtotal = $8,
            tax = $9,
            tax_percent = $10,
            total_after_tax = $11,
            updated_at = $12
        WHERE purchase_id = $1 AND item_id = $2
        "#,
    )
    .bind(purchase.purchase_id)
    .bind(item.item_id)
    .bind(&item.item_name)
    .bind(item.unit_id)
    .bind(&item.unit_name)
    .bind(item.units_purchased)
    .bind(item.price_per_unit)
    .bind(item.subtotal)
    .bind(item.tax)
    .bind(item.tax_percent)
    .bind(item.total_after_tax)
    .bind(purchase.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update purchase item: {}", e)))?;

    Ok(())
}
