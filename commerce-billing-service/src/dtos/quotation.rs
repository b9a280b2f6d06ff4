use crate::dtos::items::SaleItemRequest;
use crate::models::{ListQuotationsFilter, Quotation, QuotationItem};
use crate::utils::datetime::{date_time, option_date_time};
use crate::utils::decimal::default_decimal_round_to;
use crate::utils::round_to;
use crate::utils::validation::not_blank;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationCursor {
    pub quotation_id: i64,
    #[serde(with = "date_time")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationListQuery {
    pub party_id: Option<i64>,
    #[serde(default, with = "option_date_time")]
    pub from_date: Option<DateTime<Utc>>,
    #[serde(default, with = "option_date_time")]
    pub to_date: Option<DateTime<Utc>>,
    pub quotation_number_search_query: Option<i64>,
}

impl QuotationListQuery {
    pub fn to_filter(&self) -> ListQuotationsFilter {
        ListQuotationsFilter {
            party_id: self.party_id,
            created_between: self.from_date.zip(self.to_date),
            quotation_number: self.quotation_number_search_query,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetAllQuotationsRequest {
    pub company_id: i64,
    #[validate(range(min = 1, max = 500))]
    pub page_size: i64,
    #[serde(default)]
    pub query: Option<QuotationListQuery>,
    #[serde(default)]
    pub cursor: Option<QuotationCursor>,
    #[serde(default)]
    pub select: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAllQuotationsResponse {
    pub quotations: Vec<serde_json::Value>,
    pub has_next_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_cursor: Option<QuotationCursor>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuotationFields {
    pub company_id: i64,
    pub party_id: i64,
    #[validate(custom(function = "not_blank"))]
    pub party_name: String,
    #[validate(custom(function = "not_blank"))]
    pub created_by: String,
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
    #[validate(range(max = 10))]
    #[serde(default = "default_decimal_round_to")]
    pub decimal_round_to: u32,
    #[validate(nested)]
    pub items: Vec<SaleItemRequest>,
}

impl QuotationFields {
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
pub struct AddQuotationRequest {
    #[serde(default, with = "option_date_time")]
    pub created_at: Option<DateTime<Utc>>,
    /// Next number for the company when omitted.
    #[serde(default)]
    pub quotation_number: Option<i64>,
    #[serde(flatten)]
    #[validate(nested)]
    pub quotation: QuotationFields,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuotationRequest {
    pub quotation_id: i64,
    #[serde(flatten)]
    #[validate(nested)]
    pub quotation: QuotationFields,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationResponse {
    pub quotation: Quotation,
    pub quotation_items: Vec<QuotationItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetQuotationQuery {
    pub quotation_id: i64,
    pub company_id: i64,
}
