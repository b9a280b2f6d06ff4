//! Quotation model. A quotation is converted once a sale references it.

use crate::models::pagination::Selectable;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Quotation {
    pub quotation_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub quotation_number: i64,
    pub company_id: i64,
    pub party_id: i64,
    pub party_name: String,
    pub created_by: String,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total_after_discount: Decimal,
    pub tax: Decimal,
    pub tax_percent: Decimal,
    pub tax_name: String,
    pub total_after_tax: Decimal,
    pub sale_id: Option<i64>,
}

impl Quotation {
    pub fn is_converted(&self) -> bool {
        self.sale_id.is_some()
    }
}

impl Selectable for Quotation {
    const COLUMNS: &'static [&'static str] = &[
        "quotationId",
        "createdAt",
        "updatedAt",
        "quotationNumber",
        "companyId",
        "partyId",
        "partyName",
        "createdBy",
        "subtotal",
        "discount",
        "totalAfterDiscount",
        "tax",
        "taxPercent",
        "taxName",
        "totalAfterTax",
        "saleId",
    ];
    const ALWAYS: &'static [&'static str] = &["quotationId", "updatedAt"];
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuotationItem {
    pub quotation_id: i64,
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

#[derive(Debug, Clone, Default)]
pub struct ListQuotationsFilter {
    pub party_id: Option<i64>,
    pub created_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub quotation_number: Option<i64>,
}
