//! Metrics module for commerce-billing-service.
//! Prometheus metrics for database latency, per-company operations and
//! inventory notifications, rendered together with the HTTP request metrics
//! recorded through the `metrics` facade.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{
    histogram_opts, opts, Encoder, HistogramTimer, HistogramVec, IntCounterVec, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

pub struct BillingMetrics {
    registry: Registry,
    /// Database query duration histogram
    pub db_query_duration: HistogramVec,
    /// Business operations per company (metering)
    pub company_operations_total: IntCounterVec,
    /// Inventory notifications by kind and outcome
    pub inventory_notifications_total: IntCounterVec,
    /// Error counter for alerting
    pub errors_total: IntCounterVec,
}

static METRICS_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();
static BILLING_METRICS: OnceLock<Option<BillingMetrics>> = OnceLock::new();

impl BillingMetrics {
    fn build() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let db_query_duration = HistogramVec::new(
            histogram_opts!(
                "billing_db_query_duration_seconds",
                "Database query duration",
                vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
            ),
            &["operation"],
        )?;
        let company_operations_total = IntCounterVec::new(
            opts!(
                "billing_company_operations_total",
                "Total billing operations by company and operation type"
            ),
            &["company_id", "operation"],
        )?;
        let inventory_notifications_total = IntCounterVec::new(
            opts!(
                "billing_inventory_notifications_total",
                "Inventory notifications by kind and status"
            ),
            &["kind", "status"],
        )?;
        let errors_total = IntCounterVec::new(
            opts!("billing_errors_total", "Total errors by type for alerting"),
            &["error_type", "operation"],
        )?;

        registry.register(Box::new(db_query_duration.clone()))?;
        registry.register(Box::new(company_operations_total.clone()))?;
        registry.register(Box::new(inventory_notifications_total.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;

        Ok(Self {
            registry,
            db_query_duration,
            company_operations_total,
            inventory_notifications_total,
            errors_total,
        })
    }
}

fn billing_metrics() -> Option<&'static BillingMetrics> {
    BILLING_METRICS.get().and_then(Option::as_ref)
}

/// Initialize all metrics. Safe to call more than once (tests spawn several
/// applications in one process); only the first call installs anything.
pub fn init_metrics() {
    METRICS_HANDLE.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder not installed");
            None
        }
    });

    BILLING_METRICS.get_or_init(|| match BillingMetrics::build() {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to register billing metrics");
            None
        }
    });
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .and_then(Option::as_ref)
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(metrics) = billing_metrics() {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder.encode(&metrics.registry.gather(), &mut buffer).is_ok() {
            if let Ok(custom) = String::from_utf8(buffer) {
                output.push_str(&custom);
            }
        }
    }

    output
}

/// Start a query timer; the duration is observed when the timer drops.
pub fn start_db_timer(operation: &str) -> Option<HistogramTimer> {
    billing_metrics().map(|m| {
        m.db_query_duration
            .with_label_values(&[operation])
            .start_timer()
    })
}

/// Record a business operation for a company.
pub fn record_company_operation(company_id: i64, operation: &str) {
    if let Some(metrics) = billing_metrics() {
        let company_id = company_id.to_string();
        metrics
            .company_operations_total
            .with_label_values(&[company_id.as_str(), operation])
            .inc();
    }
}

/// Record an inventory notification outcome.
pub fn record_inventory_notification(kind: &str, status: &str) {
    if let Some(metrics) = billing_metrics() {
        metrics
            .inventory_notifications_total
            .with_label_values(&[kind, status])
            .inc();
    }
}

/// Record an error for alerting.
pub fn record_error(error_type: &str, operation: &str) {
    if let Some(metrics) = billing_metrics() {
        metrics
            .errors_total
            .with_label_values(&[error_type, operation])
            .inc();
    }
}
