use crate::models::TopSellingItem;
use crate::utils::datetime::date_time;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetCashFlowSummaryRequest {
    pub company_id: i64,
    #[serde(with = "date_time")]
    pub from: DateTime<Utc>,
    #[serde(with = "date_time")]
    pub to: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopSellersResponse {
    pub top_selling_items: Vec<TopSellingItem>,
}
