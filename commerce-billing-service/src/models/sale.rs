//! Sale model.

use crate::models::pagination::Selectable;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub sale_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub invoice_number: i64,
    pub company_id: i64,
    /// `None` for no-party bills.
    pub party_id: Option<i64>,
    pub party_name: Option<String>,
    pub is_no_party_bill: bool,
    pub done_by: String,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total_after_discount: Decimal,
    pub tax: Decimal,
    pub tax_percent: Decimal,
    pub tax_name: String,
    pub company_tax_number: String,
    pub party_tax_number: String,
    pub total_after_tax: Decimal,
    pub is_credit: bool,
    pub payment_due_date: Option<NaiveDate>,
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
    pub is_fully_paid: bool,
    pub payment_completion_date: Option<NaiveDate>,
}

impl Selectable for Sale {
    const COLUMNS: &'static [&'static str] = &[
        "saleId",
        "createdAt",
        "updatedAt",
        "invoiceNumber",
        "companyId",
        "partyId",
        "partyName",
        "isNoPartyBill",
        "doneBy",
        "subtotal",
        "discount",
        "totalAfterDiscount",
        "tax",
        "taxPercent",
        "taxName",
        "companyTaxNumber",
        "partyTaxNumber",
        "totalAfterTax",
        "isCredit",
        "paymentDueDate",
        "amountPaid",
        "amountDue",
        "isFullyPaid",
        "paymentCompletionDate",
    ];
    const ALWAYS: &'static [&'static str] = &["saleId", "updatedAt"];
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub sale_id: i64,
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
