//! Client for the inventory service.
//!
//! Purchases and sales move stock, so each one is reported to the inventory
//! service while the enclosing database transaction is still open. A failed
//! notification surfaces as `AppError::BadGateway` and the caller's
//! transaction is dropped (rolled back).

use crate::config::InventoryConfig;
use crate::dtos::items::{PurchaseItemRequest, SaleItemRequest};
use crate::models::{PurchaseItem, SaleItem};
use crate::services::metrics::{record_error, record_inventory_notification};
use crate::services::reconcile::ItemChanges;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;
use service_core::http::{retry_http_call, RetryConfig};
use service_core::observability::TracedClientExt;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Stock received with a purchase.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedItem {
    pub item_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_per_unit: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub units_purchased: Decimal,
}

/// Stock handed out with a sale.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SoldItem {
    pub item_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub selling_price_per_unit: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub units_sold: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemDelta<T> {
    pub old: T,
    pub new: T,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsChanged<T> {
    pub items_updated: Vec<ItemDelta<T>>,
    pub items_removed: Vec<T>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPurchase {
    pub company_id: i64,
    pub purchase_id: i64,
    pub items: Vec<PurchasedItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPurchaseUpdate {
    pub company_id: i64,
    pub purchase_id: i64,
    pub items: ItemsChanged<PurchasedItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSale {
    pub company_id: i64,
    pub sale_id: i64,
    pub items: Vec<SoldItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSaleUpdate {
    pub company_id: i64,
    pub sale_id: i64,
    pub items: ItemsChanged<SoldItem>,
}

impl From<&PurchaseItemRequest> for PurchasedItem {
    fn from(item: &PurchaseItemRequest) -> Self {
        Self {
            item_id: item.item_id,
            price_per_unit: item.price_per_unit,
            units_purchased: item.units_purchased,
        }
    }
}

impl From<&PurchaseItem> for PurchasedItem {
    fn from(item: &PurchaseItem) -> Self {
        Self {
            item_id: item.item_id,
            price_per_unit: item.price_per_unit,
            units_purchased: item.units_purchased,
        }
    }
}

impl From<&SaleItemRequest> for SoldItem {
    fn from(item: &SaleItemRequest) -> Self {
        Self {
            item_id: item.item_id,
            selling_price_per_unit: item.price_per_unit,
            units_sold: item.units_sold,
        }
    }
}

impl From<&SaleItem> for SoldItem {
    fn from(item: &SaleItem) -> Self {
        Self {
            item_id: item.item_id,
            selling_price_per_unit: item.price_per_unit,
            units_sold: item.units_sold,
        }
    }
}

impl<T> ItemsChanged<T> {
    /// Updated and removed lines of a reconciliation, in inventory terms.
    pub fn from_changes<O, N>(changes: &ItemChanges<O, N>) -> Self
    where
        for<'a> T: From<&'a O> + From<&'a N>,
    {
        Self {
            items_updated: changes
                .updated
                .iter()
                .map(|u| ItemDelta {
                    old: T::from(&u.old),
                    new: T::from(&u.new),
                })
                .collect(),
            items_removed: changes.removed.iter().map(|item| T::from(item)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items_updated.is_empty() && self.items_removed.is_empty()
    }
}

/// Stock notifications sent on behalf of purchases and sales.
#[async_trait]
pub trait InventorySync: Send + Sync {
    async fn record_purchase(
        &self,
        payload: &RecordPurchase,
        request_id: Option<&str>,
    ) -> Result<(), AppError>;

    async fn record_purchase_update(
        &self,
        payload: &RecordPurchaseUpdate,
        request_id: Option<&str>,
    ) -> Result<(), AppError>;

    async fn record_sale(&self, payload: &RecordSale, request_id: Option<&str>)
        -> Result<(), AppError>;

    async fn record_sale_update(
        &self,
        payload: &RecordSaleUpdate,
        request_id: Option<&str>,
    ) -> Result<(), AppError>;
}

/// HTTP implementation of [`InventorySync`].
#[derive(Clone)]
pub struct InventoryClient {
    client: reqwest::Client,
    base_url: Option<String>,
    config: InventoryConfig,
    retry: RetryConfig,
}

impl InventoryClient {
    pub fn new(config: InventoryConfig) -> Self {
        let base_url = config
            .url
            .as_ref()
            .map(|url| url.trim_end_matches('/').to_string());
        let retry = RetryConfig::with_max_retries(config.max_retries);
        Self {
            client: reqwest::Client::new(),
            base_url,
            config,
            retry,
        }
    }

    /// Override the backoff policy (tests use millisecond backoffs).
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }

    #[instrument(skip(self, payload, request_id))]
    async fn send<T: Serialize + Sync>(
        &self,
        kind: &str,
        path: &str,
        payload: &T,
        request_id: Option<&str>,
    ) -> Result<(), AppError> {
        let Some(base_url) = self.base_url.as_deref() else {
            info!(kind, "Inventory service not configured, skipping notification");
            record_inventory_notification(kind, "skipped");
            return Ok(());
        };

        let url = format!("{}/{}", base_url, path.trim_start_matches('/'));
        let timeout: Duration = self.config.timeout();

        let outcome = retry_http_call(&self.retry, kind, || {
            let request = self
                .client
                .traced_patch(&url)
                .json(payload)
                .timeout(timeout);
            async move {
                match request_id {
                    Some(id) => request.send_with_request_id(id).await,
                    None => request.send().await,
                }
            }
        })
        .await;

        match outcome {
            Ok(response) if response.status().is_success() => {
                info!(kind, status = response.status().as_u16(), "Inventory notified");
                record_inventory_notification(kind, "success");
                Ok(())
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!(kind, status = status.as_u16(), body = %body, "Inventory service rejected notification");
                record_inventory_notification(kind, "rejected");
                record_error("bad_gateway", kind);
                Err(AppError::BadGateway(format!(
                    "inventory service returned {} for {}",
                    status, kind
                )))
            }
            Err(e) => {
                warn!(kind, error = %e, "Inventory service unreachable");
                record_inventory_notification(kind, "failed");
                record_error("bad_gateway", kind);
                Err(AppError::BadGateway(format!(
                    "inventory service unreachable for {}: {}",
                    kind, e
                )))
            }
        }
    }
}

#[async_trait]
impl InventorySync for InventoryClient {
    async fn record_purchase(
        &self,
        payload: &RecordPurchase,
        request_id: Option<&str>,
    ) -> Result<(), AppError> {
        self.send(
            "record_purchase",
            &self.config.record_purchase_path,
            payload,
            request_id,
        )
        .await
    }

    async fn record_purchase_update(
        &self,
        payload: &RecordPurchaseUpdate,
        request_id: Option<&str>,
    ) -> Result<(), AppError> {
        self.send(
            "record_purchase_update",
            &self.config.record_purchase_update_path,
            payload,
            request_id,
        )
        .await
    }

    async fn record_sale(
        &self,
        payload: &RecordSale,
        request_id: Option<&str>,
    ) -> Result<(), AppError> {
        self.send("record_sale", &self.config.record_sale_path, payload, request_id)
            .await
    }

    async fn record_sale_update(
        &self,
        payload: &RecordSaleUpdate,
        request_id: Option<&str>,
    ) -> Result<(), AppError> {
        self.send(
            "record_sale_update",
            &self.config.record_sale_update_path,
            payload,
            request_id,
        )
        .await
    }
}
