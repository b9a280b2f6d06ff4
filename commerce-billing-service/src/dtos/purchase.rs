use crate::dtos::items::{non_negative, PurchaseItemRequest};
use crate::models::{ListInvoicesFilter, PaymentType, Purchase, PurchaseItem};
use crate::utils::datetime::{date_time, option_date, option_date_time};
use crate::utils::decimal::default_decimal_round_to;
use crate::utils::round_to;
use crate::utils::validation::not_blank;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseCursor {
    pub purchase_id: i64,
    #[serde(with = "date_time")]
    pub updated_at: DateTime<Utc>,
}

/// Filters accepted by the purchase and sale list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceListQuery {
    pub party_id: Option<i64>,
    #[serde(default, rename = "purchaseType", alias = "saleType")]
    pub payment_type: PaymentType,
    #[serde(default, with = "option_date_time")]
    pub from_transaction_date: Option<DateTime<Utc>>,
    #[serde(default, with = "option_date_time")]
    pub to_transaction_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub get_only_overdue_payments: bool,
    pub invoice_number_search_query: Option<i64>,
}

impl InvoiceListQuery {
    pub fn to_filter(&self) -> ListInvoicesFilter {
        ListInvoicesFilter {
            party_id: self.party_id,
            payment_type: self.payment_type,
            // Both ends are needed for a date range.
            created_between: self.from_transaction_date.zip(self.to_transaction_date),
            only_overdue: self.get_only_overdue_payments,
            invoice_number: self.invoice_number_search_query,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetAllPurchasesRequest {
    pub company_id: i64,
    #[validate(range(min = 1, max = 500))]
    pub page_size: i64,
    #[serde(default)]
    pub query: Option<InvoiceListQuery>,
    #[serde(default)]
    pub cursor: Option<PurchaseCursor>,
    #[serde(default)]
    pub select: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAllPurchasesResponse {
    pub purchases: Vec<serde_json::Value>,
    pub has_next_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_cursor: Option<PurchaseCursor>,
}

/// Header fields shared by add and update.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseFields {
    pub invoice_number: i64,
    pub company_id: i64,
    pub party_id: i64,
    #[validate(custom(function = "not_blank"))]
    pub party_name: String,
    pub subtotal: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    pub total_after_discount: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub tax_percent: Decimal,
    #[serde(default)]
    pub tax_name: String,
    pub total_after_tax: Decimal,
    pub is_credit: bool,
    #[serde(default, with = "option_date")]
    pub payment_due_date: Option<NaiveDate>,
    #[validate(custom(function = "non_negative"))]
    #[serde(default)]
    pub amount_paid: Decimal,
    #[serde(default)]
    pub amount_due: Decimal,
    pub is_fully_paid: bool,
    #[serde(default, with = "option_date")]
    pub payment_completion_date: Option<NaiveDate>,
    #[serde(default)]
    pub receipt_number: Option<String>,
    #[validate(range(max = 10))]
    #[serde(default = "default_decimal_round_to")]
    pub decimal_round_to: u32,
    #[validate(nested)]
    pub items: Vec<PurchaseItemRequest>,
}

impl PurchaseFields {
    /// Round the header totals and every line to `decimalRoundTo`.
    pub fn rounded(mut self) -> Self {
        let dp = self.decimal_round_to;
        self.subtotal = round_to(self.subtotal, dp);
        self.total_after_discount = round_to(self.total_after_discount, dp);
        self.tax = round_to(self.tax, dp);
        self.total_after_tax = round_to(self.total_after_tax, dp);
        self.items = self.items.into_iter().map(|i| i.rounded(dp)).collect();
        self
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddPurchaseRequest {
    /// Defaults to now.
    #[serde(default, with = "option_date_time")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    #[validate(nested)]
    pub purchase: PurchaseFields,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePurchaseRequest {
    pub purchase_id: i64,
    #[serde(flatten)]
    #[validate(nested)]
    pub purchase: PurchaseFields,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub purchase: Purchase,
    pub purchase_items: Vec<PurchaseItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetPurchaseQuery {
    pub purchase_id: i64,
    pub company_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADD_BODY: &str = r#"{
        "createdAt": "2024-05-01 10:00:00",
        "invoiceNumber": 101, "companyId": 1, "partyId": 3, "partyName": "Vendor",
        "subtotal": 100.005, "totalAfterDiscount": 100.005, "tax": 18.0009,
        "taxPercent": 18, "taxName": "GST", "totalAfterTax": "118.0059",
        "isCredit": true, "paymentDueDate": "2024-05-31", "amountPaid": 50,
        "amountDue": 68.01, "isFullyPaid": false, "paymentCompletionDate": null,
        "receiptNumber": null,
        "items": [{"itemId": 1, "itemName": "Rice", "unitId": 1, "unitName": "kg",
                   "unitsPurchased": 10, "pricePerUnit": 10.0005, "subtotal": 100.005,
                   "tax": 18.0009, "taxPercent": 18, "totalAfterTax": 118.0059}]
    }"#;

    #[test]
    fn test_add_request_parses_and_defaults_rounding() {
        let request: AddPurchaseRequest = serde_json::from_str(ADD_BODY).unwrap();
        assert!(request.validate().is_ok());
        assert!(request.created_at.is_some());
        assert_eq!(request.purchase.decimal_round_to, 2);
        assert_eq!(
            request.purchase.payment_due_date,
            NaiveDate::from_ymd_opt(2024, 5, 31)
        );

        let rounded = request.purchase.rounded();
        assert_eq!(rounded.subtotal.to_string(), "100.01");
        assert_eq!(rounded.total_after_tax.to_string(), "118.01");
        assert_eq!(rounded.items[0].total_after_tax.to_string(), "118.01");
        assert_eq!(rounded.amount_paid.to_string(), "50");
    }

    #[test]
    fn test_decimal_round_to_is_bounded() {
        let body = ADD_BODY.replace("\"items\"", "\"decimalRoundTo\": 11, \"items\"");
        let request: AddPurchaseRequest = serde_json::from_str(&body).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_invalid_nested_item_fails_validation() {
        let body = ADD_BODY.replace("\"itemName\": \"Rice\"", "\"itemName\": \"\"");
        let request: AddPurchaseRequest = serde_json::from_str(&body).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_date_range_needs_both_ends() {
        let query: InvoiceListQuery = serde_json::from_str(
            r#"{"fromTransactionDate": "2024-01-01 00:00:00", "purchaseType": "CASH"}"#,
        )
        .unwrap();
        let filter = query.to_filter();
        assert!(filter.created_between.is_none());
        assert_eq!(filter.payment_type, PaymentType::Cash);
    }

    #[test]
    fn test_page_size_bounds() {
        let request: GetAllPurchasesRequest =
            serde_json::from_str(r#"{"companyId": 1, "pageSize": 501}"#).unwrap();
        assert!(request.validate().is_err());
        let request: GetAllPurchasesRequest =
            serde_json::from_str(r#"{"companyId": 1, "pageSize": 500}"#).unwrap();
        assert!(request.validate().is_ok());
    }
}
