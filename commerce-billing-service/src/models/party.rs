//! Third parties: the customers and vendors a company trades with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub party_id: i64,
    pub company_id: i64,
    pub party_name: String,
    pub default_sale_credit_allowance_in_days: i32,
    pub default_purchase_credit_allowance_in_days: i32,
    pub country_id: i32,
    pub phone_number: String,
    pub is_active: bool,
    /// JSON array of tax registrations, stored as-is.
    pub tax_details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values written by add/update.
#[derive(Debug, Clone)]
pub struct PartyInput {
    pub company_id: i64,
    pub party_name: String,
    pub default_sale_credit_allowance_in_days: i32,
    pub default_purchase_credit_allowance_in_days: i32,
    pub country_id: i32,
    pub phone_number: String,
    pub is_active: bool,
    pub tax_details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct ListPartiesFilter {
    pub is_active: Option<bool>,
    pub party_name_search: Option<String>,
}

/// Escape `%`, `_` and `\` so user text matches literally inside `ILIKE`.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
