//! Commerce billing service: parties, purchases, sales, quotations, returns
//! and cash-flow summaries for multi-tenant (company-scoped) bookkeeping.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

pub use startup::{AppState, Application};
