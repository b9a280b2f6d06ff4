use crate::dtos::items::PurchaseItemRequest;
use crate::models::{ListReturnsFilter, PurchaseReturn, PurchaseReturnItem};
use crate::utils::datetime::{date_time, option_date_time};
use crate::utils::decimal::default_decimal_round_to;
use crate::utils::round_to;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Returns page by creation time, not last update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReturnCursor {
    pub purchase_return_id: i64,
    #[serde(with = "date_time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnListQuery {
    #[serde(default, with = "option_date_time")]
    pub from_date: Option<DateTime<Utc>>,
    #[serde(default, with = "option_date_time")]
    pub to_date: Option<DateTime<Utc>>,
    #[serde(alias = "saleReturnNumber")]
    pub purchase_return_number: Option<i64>,
}

impl ReturnListQuery {
    pub fn to_filter(&self) -> ListReturnsFilter {
        ListReturnsFilter {
            created_between: self.from_date.zip(self.to_date),
            return_number: self.purchase_return_number,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetAllPurchaseReturnsRequest {
    pub company_id: i64,
    #[validate(range(min = 1, max = 500))]
    pub page_size: i64,
    #[serde(default)]
    pub query: Option<ReturnListQuery>,
    #[serde(default)]
    pub cursor: Option<PurchaseReturnCursor>,
    #[serde(default)]
    pub select: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAllPurchaseReturnsResponse {
    pub purchase_returns: Vec<serde_json::Value>,
    pub has_next_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_cursor: Option<PurchaseReturnCursor>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddPurchaseReturnRequest {
    #[serde(default, with = "option_date_time")]
    pub created_at: Option<DateTime<Utc>>,
    pub purchase_id: i64,
    #[serde(default)]
    pub purchase_return_number: Option<i64>,
    pub company_id: i64,
    pub subtotal: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub tax_percent: Decimal,
    #[serde(default)]
    pub tax_name: String,
    pub total_after_tax: Decimal,
    #[validate(range(max = 10))]
    #[serde(default = "default_decimal_round_to")]
    pub decimal_round_to: u32,
    #[validate(length(min = 1), nested)]
    pub items: Vec<PurchaseItemRequest>,
}

impl AddPurchaseReturnRequest {
    pub fn rounded(mut self) -> Self {
        let dp = self.decimal_round_to;
        self.subtotal = round_to(self.subtotal, dp);
        self.tax = round_to(self.tax, dp);
        self.total_after_tax = round_to(self.total_after_tax, dp);
        self.items = self.items.into_iter().map(|i| i.rounded(dp)).collect();
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReturnResponse {
    pub purchase_return: PurchaseReturn,
    pub purchase_return_items: Vec<PurchaseReturnItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReturnsOfPurchaseResponse {
    pub purchase_returns: Vec<PurchaseReturnResponse>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetPurchaseReturnQuery {
    pub purchase_return_id: i64,
    pub company_id: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetPurchaseReturnsOfPurchaseQuery {
    pub purchase_id: i64,
    pub company_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_needs_items() {
        let request: AddPurchaseReturnRequest = serde_json::from_str(
            r#"{"purchaseId": 1, "companyId": 1, "subtotal": 0, "totalAfterTax": 0, "items": []}"#,
        )
        .unwrap();
        assert!(request.validate().is_err());
    }
}
