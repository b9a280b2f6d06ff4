use crate::models::pagination::Selectable;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SaleReturn {
    pub sale_return_id: i64,
    pub created_at: DateTime<Utc>,
    pub sale_id: i64,
    pub sale_return_number: i64,
    pub company_id: i64,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub tax_percent: Decimal,
    pub tax_name: String,
    pub total_after_tax: Decimal,
}

impl Selectable for SaleReturn {
    const COLUMNS: &'static [&'static str] = &[
        "saleReturnId",
        "createdAt",
        "saleId",
        "saleReturnNumber",
        "companyId",
        "subtotal",
        "tax",
        "taxPercent",
        "taxName",
        "totalAfterTax",
    ];
    const ALWAYS: &'static [&'static str] = &["saleReturnId", "createdAt"];
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SaleReturnItem {
    pub sale_return_id: i64,
    pub item_id: i64,
    pub item_name: String,
    pub company_id: i64,
    pub unit_id: i64,
    pub unit_name: String,
    pub units_sold: Decimal,
    pub price_per_unit: Decimal,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub tax_percent: Decimal,
    pub total_after_tax: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
