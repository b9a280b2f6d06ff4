use crate::models::{ListPartiesFilter, Party, PartyInput};
use crate::utils::datetime::date_time;
use crate::utils::validation::not_blank;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

fn json_array(value: &serde_json::Value) -> Result<(), ValidationError> {
    if value.is_array() {
        Ok(())
    } else {
        Err(ValidationError::new("not_an_array"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyCursor {
    pub party_id: i64,
    #[serde(with = "date_time")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyListQuery {
    pub is_active: Option<bool>,
    pub party_name_search_query: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetAllPartiesRequest {
    pub company_id: i64,
    #[validate(range(min = 1, max = 500))]
    pub page_size: i64,
    #[serde(default)]
    pub query: Option<PartyListQuery>,
    #[serde(default)]
    pub cursor: Option<PartyCursor>,
}

impl GetAllPartiesRequest {
    pub fn filter(&self) -> ListPartiesFilter {
        let query = self.query.clone().unwrap_or_default();
        ListPartiesFilter {
            is_active: query.is_active,
            party_name_search: query
                .party_name_search_query
                .filter(|s| !s.trim().is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAllPartiesResponse {
    pub parties: Vec<Party>,
    pub has_next_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_cursor: Option<PartyCursor>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddPartyRequest {
    pub company_id: i64,
    #[validate(custom(function = "not_blank"))]
    pub party_name: String,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub default_sale_credit_allowance_in_days: i32,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub default_purchase_credit_allowance_in_days: i32,
    pub country_id: i32,
    #[validate(custom(function = "not_blank"))]
    pub phone_number: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[validate(custom(function = "json_array"))]
    #[serde(default)]
    pub tax_details: Option<serde_json::Value>,
}

fn default_true() -> bool {
    true
}

impl AddPartyRequest {
    pub fn into_input(self) -> PartyInput {
        PartyInput {
            company_id: self.company_id,
            party_name: self.party_name.trim().to_string(),
            default_sale_credit_allowance_in_days: self.default_sale_credit_allowance_in_days,
            default_purchase_credit_allowance_in_days: self
                .default_purchase_credit_allowance_in_days,
            country_id: self.country_id,
            phone_number: self.phone_number.trim().to_string(),
            is_active: self.is_active,
            tax_details: self.tax_details,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePartyRequest {
    pub party_id: i64,
    #[serde(flatten)]
    #[validate(nested)]
    pub party: AddPartyRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyResponse {
    pub party: Party,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetPartyQuery {
    pub party_id: i64,
    pub company_id: i64,
}
