//! Application state shared by the HTTP handlers

use crate::infrastructure::billing::BillingCollector;
use crate::infrastructure::observability::PrometheusMetrics;

#[derive(Clone)]
pub struct AppState {
    pub collector: BillingCollector,
    /// Self-instrumentation, `None` when disabled
    pub metrics: Option<PrometheusMetrics>,
    pub metrics_path: String,
}

impl AppState {
    pub fn new(
        collector: BillingCollector,
        metrics: Option<PrometheusMetrics>,
        metrics_path: impl Into<String>,
    ) -> Self {
        Self {
            collector,
            metrics,
            metrics_path: metrics_path.into(),
        }
    }
}
