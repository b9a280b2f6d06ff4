//! Configuration module for commerce-billing-service.

use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub inventory: InventoryConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Where stock movements are reported. `url: None` disables notifications.
#[derive(Debug, Clone)]
pub struct InventoryConfig {
    pub url: Option<String>,
    pub record_purchase_path: String,
    pub record_purchase_update_path: String,
    pub record_sale_path: String,
    pub record_sale_update_path: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl InventoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            url: None,
            record_purchase_path: "item/record-purchase".to_string(),
            record_purchase_update_path: "item/record-purchase-update".to_string(),
            record_sale_path: "item/record-sale".to_string(),
            record_sale_update_path: "item/record-sale-update".to_string(),
            timeout_secs: 10,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// HS256 secret for access tokens. Unset means the gateway has already
    /// authorised the caller.
    pub access_token_secret: Option<Secret<String>>,
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl BillingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let defaults = InventoryConfig::default();

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "commerce-billing-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: non_empty_var("OTLP_ENDPOINT"),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: parsed_var("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: parsed_var("DATABASE_MIN_CONNECTIONS", 2),
            },
            inventory: InventoryConfig {
                url: non_empty_var("INVENTORY_SERVICE_URL"),
                record_purchase_path: non_empty_var("INVENTORY_RECORD_PURCHASE_PATH")
                    .unwrap_or(defaults.record_purchase_path),
                record_purchase_update_path: non_empty_var(
                    "INVENTORY_RECORD_PURCHASE_UPDATE_PATH",
                )
                .unwrap_or(defaults.record_purchase_update_path),
                record_sale_path: non_empty_var("INVENTORY_RECORD_SALE_PATH")
                    .unwrap_or(defaults.record_sale_path),
                record_sale_update_path: non_empty_var("INVENTORY_RECORD_SALE_UPDATE_PATH")
                    .unwrap_or(defaults.record_sale_update_path),
                timeout_secs: parsed_var("INVENTORY_TIMEOUT_SECS", defaults.timeout_secs),
                max_retries: parsed_var("INVENTORY_MAX_RETRIES", defaults.max_retries),
            },
            auth: AuthConfig {
                access_token_secret: non_empty_var("ACCESS_TOKEN_SECRET").map(Secret::new),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: [&str; 5] = [
        "DATABASE_URL",
        "INVENTORY_SERVICE_URL",
        "INVENTORY_MAX_RETRIES",
        "ACCESS_TOKEN_SECRET",
        "INVENTORY_RECORD_SALE_PATH",
    ];

    fn clear() {
        for key in KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_database_url_required() {
        clear();
        let err = BillingConfig::from_env().unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    #[serial]
    fn test_inventory_defaults_and_overrides() {
        clear();
        env::set_var("DATABASE_URL", "postgres://localhost/billing");
        env::set_var("INVENTORY_SERVICE_URL", "  ");
        env::set_var("INVENTORY_MAX_RETRIES", "5");
        env::set_var("INVENTORY_RECORD_SALE_PATH", "stock/sale");

        let config = BillingConfig::from_env().unwrap();
        assert!(config.inventory.url.is_none());
        assert_eq!(config.inventory.max_retries, 5);
        assert_eq!(config.inventory.record_sale_path, "stock/sale");
        assert_eq!(config.inventory.record_purchase_path, "item/record-purchase");
        assert_eq!(config.inventory.timeout(), Duration::from_secs(10));
        assert!(config.auth.access_token_secret.is_none());
        clear();
    }

    #[test]
    #[serial]
    fn test_access_token_secret_read() {
        use secrecy::ExposeSecret;

        clear();
        env::set_var("DATABASE_URL", "postgres://localhost/billing");
        env::set_var("ACCESS_TOKEN_SECRET", "s3cret");

        let config = BillingConfig::from_env().unwrap();
        let secret = config.auth.access_token_secret.unwrap();
        assert_eq!(secret.expose_secret(), "s3cret");
        clear();
    }
}
