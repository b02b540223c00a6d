//! Exporter self-instrumentation

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;

/// Handle rendering the self-instrumentation metrics
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    /// Render metrics in the Prometheus text format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Install the global metrics recorder
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Exporter metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            register_default_metrics();
            tracing::info!("Exporter metrics initialized");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize exporter metrics: {}", e);
            None
        }
    }
}

fn register_default_metrics() {
    gauge!("cloud_billing_exporter_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Record the outcome of one billing source query
pub fn record_source_query(provider: &str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };

    counter!(
        "billing_source_queries_total",
        "provider" => provider.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!("billing_source_query_duration_seconds", "provider" => provider.to_string())
        .record(duration.as_secs_f64());
}

/// Record cost regressions skipped by the reconciler
pub fn record_counter_regressions(provider: &str, count: usize) {
    if count == 0 {
        return;
    }
    counter!("billing_counter_regressions_total", "provider" => provider.to_string())
        .increment(count as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_metrics_install_nothing() {
        let config = MetricsConfig { enabled: false };
        assert!(init_metrics(&config).is_none());
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_source_query("aws", true, Duration::from_millis(20));
        record_counter_regressions("aws", 2);
        record_counter_regressions("gcp", 0);
    }
}
