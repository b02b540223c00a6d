//! Observability infrastructure - exporter metrics

mod config;
mod metrics;

pub use config::{MetricsConfig, ObservabilityConfig};
pub use metrics::{init_metrics, record_counter_regressions, record_source_query, PrometheusMetrics};
