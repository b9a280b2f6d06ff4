//! Line items as submitted by clients.

use crate::utils::round_to;
use crate::utils::validation::not_blank;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

pub fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("negative"));
    }
    Ok(())
}

/// Line of a purchase or purchase return.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseItemRequest {
    pub item_id: i64,
    #[validate(custom(function = "not_blank"))]
    pub item_name: String,
    pub unit_id: i64,
    #[validate(custom(function = "not_blank"))]
    pub unit_name: String,
    #[validate(custom(function = "non_negative"))]
    pub units_purchased: Decimal,
    #[validate(custom(function = "non_negative"))]
    pub price_per_unit: Decimal,
    pub subtotal: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub tax_percent: Decimal,
    pub total_after_tax: Decimal,
}

impl PurchaseItemRequest {
    /// Round the computed amounts the way they will be stored.
    pub fn rounded(mut self, dp: u32) -> Self {
        self.subtotal = round_to(self.subtotal, dp);
        self.tax = round_to(self.tax, dp);
        self.total_after_tax = round_to(self.total_after_tax, dp);
        self
    }
}

/// Line of a sale, quotation or sale return.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaleItemRequest {
    pub item_id: i64,
    #[validate(custom(function = "not_blank"))]
    pub item_name: String,
    pub unit_id: i64,
    #[validate(custom(function = "not_blank"))]
    pub unit_name: String,
    #[validate(custom(function = "non_negative"))]
    pub units_sold: Decimal,
    #[validate(custom(function = "non_negative"))]
    pub price_per_unit: Decimal,
    pub subtotal: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub tax_percent: Decimal,
    pub total_after_tax: Decimal,
}

impl SaleItemRequest {
    pub fn rounded(mut self, dp: u32) -> Self {
        self.subtotal = round_to(self.subtotal, dp);
        self.tax = round_to(self.tax, dp);
        self.total_after_tax = round_to(self.total_after_tax, dp);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_numbers_and_strings() {
        let item: SaleItemRequest = serde_json::from_str(
            r#"{"itemId": 3, "itemName": "Soap", "unitId": 1, "unitName": "pcs",
                "unitsSold": 2, "pricePerUnit": "12.5", "subtotal": 25.0,
                "totalAfterTax": "25.00"}"#,
        )
        .unwrap();
        assert_eq!(item.price_per_unit.to_string(), "12.5");
        assert!(item.tax.is_zero());
        assert!(item.validate().is_ok());
    }

    #[test]
    fn test_negative_units_rejected() {
        let item: PurchaseItemRequest = serde_json::from_str(
            r#"{"itemId": 3, "itemName": "Soap", "unitId": 1, "unitName": "pcs",
                "unitsPurchased": -1, "pricePerUnit": 1, "subtotal": 1,
                "totalAfterTax": 1}"#,
        )
        .unwrap();
        assert!(item.validate().is_err());
    }

    #[test]
    fn test_rounding_only_touches_computed_amounts() {
        let item = serde_json::from_str::<PurchaseItemRequest>(
            r#"{"itemId": 1, "itemName": "Rice", "unitId": 1, "unitName": "kg",
                "unitsPurchased": 1.125, "pricePerUnit": 3.333, "subtotal": 3.749625,
                "tax": 0.1875, "totalAfterTax": 3.937125}"#,
        )
        .unwrap()
        .rounded(2);
        assert_eq!(item.units_purchased.to_string(), "1.125");
        assert_eq!(item.price_per_unit.to_string(), "3.333");
        assert_eq!(item.subtotal.to_string(), "3.75");
        assert_eq!(item.tax.to_string(), "0.19");
        assert_eq!(item.total_after_tax.to_string(), "3.94");
    }
}
