//! Purchase model.

use crate::models::pagination::Selectable;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub purchase_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub invoice_number: i64,
    pub company_id: i64,
    pub party_id: i64,
    pub party_name: String,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total_after_discount: Decimal,
    pub tax: Decimal,
    pub tax_percent: Decimal,
    pub tax_name: String,
    pub total_after_tax: Decimal,
    pub is_credit: bool,
    pub payment_due_date: Option<NaiveDate>,
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
    pub is_fully_paid: bool,
    pub payment_completion_date: Option<NaiveDate>,
    pub receipt_number: Option<String>,
}

impl Selectable for Purchase {
    const COLUMNS: &'static [&'static str] = &[
        "purchaseId",
        "createdAt",
        "updatedAt",
        "invoiceNumber",
        "companyId",
        "partyId",
        "partyName",
        "subtotal",
        "discount",
        "totalAfterDiscount",
        "tax",
        "taxPercent",
        "taxName",
        "totalAfterTax",
        "isCredit",
        "paymentDueDate",
        "amountPaid",
        "amountDue",
        "isFullyPaid",
        "paymentCompletionDate",
        "receiptNumber",
    ];
    const ALWAYS: &'static [&'static str] = &["purchaseId", "updatedAt"];
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseItem {
    pub purchase_id: i64,
    pub item_id: i64,
    pub item_name: String,
    pub company_id: i64,
    pub unit_id: i64,
    pub unit_name: String,
    pub units_purchased: Decimal,
    pub price_per_unit: Decimal,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub tax_percent: Decimal,
    pub total_after_tax: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cash or credit purchases; `All` disables the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentType {
    #[default]
    All,
    Cash,
    Credit,
}

impl PaymentType {
    /// Value for an `is_credit = $n` filter, `None` meaning no filter.
    pub fn is_credit(&self) -> Option<bool> {
        match self {
            PaymentType::All => None,
            PaymentType::Cash => Some(false),
            PaymentType::Credit => Some(true),
        }
    }
}

/// Filters shared by the purchase and sale list queries.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub party_id: Option<i64>,
    pub payment_type: PaymentType,
    pub created_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub only_overdue: bool,
    pub invoice_number: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_type_parsing() {
        let parsed: PaymentType = serde_json::from_str("\"CREDIT\"").unwrap();
        assert_eq!(parsed, PaymentType::Credit);
        assert_eq!(parsed.is_credit(), Some(true));
        assert_eq!(PaymentType::All.is_credit(), None);
        assert!(serde_json::from_str::<PaymentType>("\"credit\"").is_err());
    }
}
