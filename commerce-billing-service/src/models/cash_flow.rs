//! Cash journal entries and the summaries computed over them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Which document a journal entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CashSource {
    Purchase(i64),
    Sale(i64),
    PurchaseReturn(i64),
    SaleReturn(i64),
}

/// One money movement. Exactly one of `cash_in`/`cash_out` is non-zero.
#[derive(Debug, Clone)]
pub struct CashEntry {
    pub company_id: i64,
    pub transaction_date_time: DateTime<Utc>,
    pub cash_in: Decimal,
    pub cash_out: Decimal,
    pub source: CashSource,
}

impl CashEntry {
    pub fn cash_in(company_id: i64, amount: Decimal, at: DateTime<Utc>, source: CashSource) -> Self {
        Self {
            company_id,
            transaction_date_time: at,
            cash_in: amount,
            cash_out: Decimal::ZERO,
            source,
        }
    }

    pub fn cash_out(company_id: i64, amount: Decimal, at: DateTime<Utc>, source: CashSource) -> Self {
        Self {
            company_id,
            transaction_date_time: at,
            cash_in: Decimal::ZERO,
            cash_out: amount,
            source,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CashFlowSummary {
    pub cash_in: Decimal,
    pub cash_out: Decimal,
    pub collections_due: Decimal,
    pub payments_due: Decimal,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TopSellingItem {
    pub item_id: i64,
    pub item_name: String,
    pub total_units_sold: Decimal,
}
