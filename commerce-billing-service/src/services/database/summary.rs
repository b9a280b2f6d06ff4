use super::Database;
use crate::models::{CashFlowSummary, TopSellingItem};
use crate::services::metrics::start_db_timer;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::instrument;

/// Items listed by the top-sellers summary.
pub const TOP_SELLERS_LIMIT: i64 = 5;

impl Database {
    /// Cash moved between `from` and `to`, plus what is still owed either way
    /// on documents due by `to`.
    #[instrument(skip(self), fields(company_id = %company_id))]
    pub async fn cash_flow_summary(
        &self,
        company_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<CashFlowSummary, AppError> {
        let _timer = start_db_timer("cash_flow_summary");

        let due_by = to.date_naive();
        let (cash_in, cash_out, collections_due, payments_due) =
            sqlx::query_as::<_, (Decimal, Decimal, Decimal, Decimal)>(
                r#"
                SELECT
                    (SELECT COALESCE(SUM(cash_in), 0) FROM cash_in_out
                      WHERE company_id = $1 AND transaction_date_time BETWEEN $2 AND $3),
                    (SELECT COALESCE(SUM(cash_out), 0) FROM cash_in_out
                      WHERE company_id = $1 AND transaction_date_time BETWEEN $2 AND $3),
                    (SELECT COALESCE(SUM(amount_due), 0) FROM sales
                      WHERE company_id = $1 AND is_fully_paid = FALSE AND payment_due_date <= $4),
                    (SELECT COALESCE(SUM(amount_due), 0) FROM purchases
                      WHERE company_id = $1 AND is_fully_paid = FALSE AND payment_due_date <= $4)
                "#,
            )
            .bind(company_id)
            .bind(from)
            .bind(to)
            .bind(due_by)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to compute cash flow summary: {}", e))
            })?;

        Ok(CashFlowSummary {
            cash_in,
            cash_out,
            collections_due,
            payments_due,
        })
    }

    /// Best-selling items by units on sales created in the month containing `now`.
    #[instrument(skip(self), fields(company_id = %company_id))]
    pub async fn top_sellers_for_month(
        &self,
        company_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<TopSellingItem>, AppError> {
        let _timer = start_db_timer("top_sellers_for_month");

        let (month_start, next_month_start) = month_bounds(now.date_naive());

        sqlx::query_as::<_, TopSellingItem>(
            r#"
            SELECT si.item_id, si.item_name, SUM(si.units_sold) AS total_units_sold
            FROM sale_items si
            JOIN sales s ON s.sale_id = si.sale_id
            WHERE s.company_id = $1
              AND s.created_at >= $2
              AND s.created_at < $3
            GROUP BY si.item_id, si.item_name
            ORDER BY total_units_sold DESC, si.item_id ASC
            LIMIT $4
            "#,
        )
        .bind(company_id)
        .bind(month_start)
        .bind(next_month_start)
        .bind(TOP_SELLERS_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get top sellers: {}", e)))
    }
}

/// First instant of `day`'s month and of the month after, in UTC.
fn month_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let first = day.with_day(1).unwrap_or(day);
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    }
    .unwrap_or(first);

    (
        first.and_time(chrono::NaiveTime::MIN).and_utc(),
        next.and_time(chrono::NaiveTime::MIN).and_utc(),
    )
}
