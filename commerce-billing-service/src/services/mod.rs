//! Services module for commerce-billing-service.

pub mod database;
pub mod inventory;
pub mod metrics;
pub mod reconcile;

pub use database::Database;
pub use inventory::{InventoryClient, InventorySync};
pub use metrics::{get_metrics, init_metrics, record_company_operation, record_error};
