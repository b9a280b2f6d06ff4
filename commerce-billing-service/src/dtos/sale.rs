use crate::dtos::items::{non_negative, SaleItemRequest};
use crate::dtos::purchase::InvoiceListQuery;
use crate::models::{Sale, SaleItem};
use crate::utils::datetime::{date_time, option_date, option_date_time};
use crate::utils::decimal::default_decimal_round_to;
use crate::utils::round_to;
use crate::utils::validation::not_blank;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleCursor {
    pub sale_id: i64,
    #[serde(with = "date_time")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetAllSalesRequest {
    pub company_id: i64,
    #[validate(range(min = 1, max = 500))]
    pub page_size: i64,
    #[serde(default)]
    pub query: Option<InvoiceListQuery>,
    #[serde(default)]
    pub cursor: Option<SaleCursor>,
    #[serde(default)]
    pub select: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAllSalesResponse {
    pub sales: Vec<serde_json::Value>,
    pub has_next_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_cursor: Option<SaleCursor>,
}

/// A bill either names a party or is explicitly a no-party bill.
fn party_unless_no_party_bill(sale: &SaleFields) -> Result<(), ValidationError> {
    if sale.is_no_party_bill {
        return Ok(());
    }
    let has_name = sale
        .party_name
        .as_deref()
        .is_some_and(|name| !name.trim().is_empty());
    if sale.party_id.is_none() || !has_name {
        return Err(ValidationError::new("party_required"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "party_unless_no_party_bill"))]
pub struct SaleFields {
    /// Next number for the company when omitted.
    #[serde(default)]
    pub invoice_number: Option<i64>,
    pub company_id: i64,
    #[serde(default)]
    pub party_id: Option<i64>,
    #[serde(default)]
    pub party_name: Option<String>,
    #[serde(default)]
    pub is_no_party_bill: bool,
    #[validate(custom(function = "not_blank"))]
    pub done_by: String,
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
    #[serde(default)]
    pub company_tax_number: String,
    #[serde(default)]
    pub party_tax_number: String,
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
    #[validate(range(max = 10))]
    #[serde(default = "default_decimal_round_to")]
    pub decimal_round_to: u32,
    #[validate(nested)]
    pub items: Vec<SaleItemRequest>,
}

impl SaleFields {
    pub fn rounded(mut self) -> Self {
        let dp = self.decimal_round_to;
        self.subtotal = round_to(self.subtotal, dp);
        self.total_after_discount = round_to(self.total_after_discount, dp);
        self.tax = round_to(self.tax, dp);
        self.total_after_tax = round_to(self.total_after_tax, dp);
        self.items = self.items.into_iter().map(|i| i.rounded(dp)).collect();
        // A no-party bill carries no party reference.
        if self.is_no_party_bill {
            self.party_id = None;
            self.party_name = None;
        }
        self
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddSaleRequest {
    #[serde(default, with = "option_date_time")]
    pub created_at: Option<DateTime<Utc>>,
    /// Quotation this sale converts, if any.
    #[serde(default)]
    pub quotation_number: Option<i64>,
    #[serde(flatten)]
    #[validate(nested)]
    pub sale: SaleFields,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSaleRequest {
    pub sale_id: i64,
    #[serde(flatten)]
    #[validate(nested)]
    pub sale: SaleFields,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleResponse {
    pub sale: Sale,
    pub sale_items: Vec<SaleItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GetSaleQuery {
    pub sale_id: i64,
    pub company_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(party: &str) -> String {
        format!(
            r#"{{"companyId": 1, {party} "doneBy": "cashier",
                "subtotal": 10, "totalAfterDiscount": 10, "totalAfterTax": 10,
                "isCredit": false, "isFullyPaid": true, "amountPaid": 10,
                "items": []}}"#
        )
    }

    #[test]
    fn test_party_required_for_regular_bill() {
        let request: AddSaleRequest = serde_json::from_str(&body("")).unwrap();
        assert!(request.validate().is_err());

        let request: AddSaleRequest =
            serde_json::from_str(&body(r#""partyId": 2, "partyName": "Walk-in Co","#)).unwrap();
        assert!(request.validate().is_ok());
        assert!(request.sale.invoice_number.is_none());
    }

    #[test]
    fn test_no_party_bill_drops_party_reference() {
        let request: AddSaleRequest = serde_json::from_str(&body(
            r#""isNoPartyBill": true, "partyId": 2, "partyName": "ignored","#,
        ))
        .unwrap();
        assert!(request.validate().is_ok());
        let sale = request.sale.rounded();
        assert!(sale.party_id.is_none());
        assert!(sale.party_name.is_none());
    }

    #[test]
    fn test_sale_type_alias_is_accepted() {
        let request: GetAllSalesRequest = serde_json::from_str(
            r#"{"companyId": 1, "pageSize": 5, "query": {"saleType": "CREDIT"}}"#,
        )
        .unwrap();
        let filter = request.query.unwrap().to_filter();
        assert_eq!(filter.payment_type.is_credit(), Some(true));
    }
}
