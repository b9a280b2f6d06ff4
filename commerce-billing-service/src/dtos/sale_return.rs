use crate::dtos::items::{non_negative, SaleItemRequest};
use crate::dtos::purchase_return::ReturnListQuery;
use crate::models::{SaleReturn, SaleReturnItem};
use crate::utils::datetime::{date_time, option_date_time};
use crate::utils::decimal::default_decimal_round_to;
use crate::utils::round_to;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleReturnCursor {
    pub sale_return_id: i64,
    #[serde(with = "date_time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetAllSaleReturnsRequest {
    pub company_id: i64,
    #[validate(range(min = 1, max = 500))]
    pub page_size: i64,
    #[serde(default)]
    pub query: Option<ReturnListQuery>,
    #[serde(default)]
    pub cursor: Option<SaleReturnCursor>,
    #[serde(default)]
    pub select: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAllSaleReturnsResponse {
    pub sale_returns: Vec<serde_json::Value>,
    pub has_next_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_cursor: Option<SaleReturnCursor>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddSaleReturnRequest {
    #[serde(default, with = "option_date_time")]
    pub created_at: Option<DateTime<Utc>>,
    pub sale_id: i64,
    #[serde(default)]
    pub sale_return_number: Option<i64>,
    pub company_id: i64,
    pub subtotal: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub tax_percent: Decimal,
    #[serde(default)]
    pub tax_name: String,
    pub total_after_tax: Decimal,
    /// Cash refunded to the customer; recorded as cash-out when positive.
    #[validate(custom(function = "non_negative"))]
    #[serde(default)]
    pub cash_out: Decimal,
    #[validate(range(max = 10))]
    #[serde(default = "default_decimal_round_to")]
    pub decimal_round_to: u32,
    #[validate(length(min = 1), nested)]
    pub items: Vec<SaleItemRequest>,
}

impl AddSaleReturnRequest {
    pub fn rounded(mut self) -> Self {
        let dp = self.decimal_round_to;
        self.subtotal = round_to(self.subtotal, dp);
        self.tax = round_to(self.tax, dp);
        self.total_after_tax = round_to(self.total_after_tax, dp);
        self.cash_out = round_to(self.cash_out, dp);
        self.items = self.items.into_iter().map(|i| i.rounded(dp)).collect();
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleReturnResponse {
    pub sale_return: SaleReturn,
    pub sale_return_items: Vec<SaleReturnItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleReturnsOfSaleResponse {
    pub sale_returns: Vec<SaleReturnResponse>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetSaleReturnQuery {
    pub sale_return_id: i64,
    pub company_id: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetSaleReturnsOfSaleQuery {
    pub sale_id: i64,
    pub company_id: i64,
}
