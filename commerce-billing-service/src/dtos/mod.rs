//! Request and response bodies for the HTTP API (camelCase JSON).

pub mod items;
pub mod party;
pub mod purchase;
pub mod purchase_return;
pub mod quotation;
pub mod sale;
pub mod sale_return;
pub mod summary;

pub use items::{PurchaseItemRequest, SaleItemRequest};

use chrono::{DateTime, Utc};
use service_core::error::AppError;

/// Reject a date range whose start is after its end.
pub fn check_range(range: Option<(DateTime<Utc>, DateTime<Utc>)>) -> Result<(), AppError> {
    match range {
        Some((from, to)) if from > to => Err(AppError::BadRequest(anyhow::anyhow!(
            "from date must not be after to date"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_range_is_bad_request() {
        let from = Utc::now();
        let to = from - chrono::Duration::days(1);
        assert!(check_range(Some((from, to))).is_err());
        assert!(check_range(Some((to, from))).is_ok());
        assert!(check_range(None).is_ok());
    }
}
