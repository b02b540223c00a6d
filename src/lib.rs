//! Cloud Billing Exporter
//!
//! Turns AWS and GCP billing data into monotonically increasing Prometheus
//! cost counters:
//! - AWS detailed billing CSV reports from S3, accounts from AWS Organizations
//! - GCP daily billing JSON exports from GCS, or the BigQuery billing export,
//!   projects from Cloud Resource Manager

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::AppState;
use domain::{BillingSource, DomainError, SystemClock};
use infrastructure::billing::{BillingCollector, BillingSourceFactory, CostRegistry};
use infrastructure::observability::PrometheusMetrics;

pub const NO_SOURCES_CONFIGURED: &str =
    "no billing source configured: set aws.bucket_name, gcp.bucket_name or gcp.bigquery_table";

/// Build every billing source enabled in `config`, feeding `registry`
pub async fn create_sources(
    config: &AppConfig,
    registry: &CostRegistry,
) -> Result<Vec<Arc<dyn BillingSource>>, DomainError> {
    let factory = BillingSourceFactory::new(
        config,
        Arc::new(SystemClock),
        registry.counters().clone(),
    );

    factory.create_all(config).await
}

/// Build the sources, keep the ones that pass their test and wrap them in
/// the application state
pub async fn create_app_state(
    config: &AppConfig,
    metrics: Option<PrometheusMetrics>,
) -> anyhow::Result<AppState> {
    let registry = CostRegistry::new()?;

    let candidates = create_sources(config, &registry).await?;
    if candidates.is_empty() {
        anyhow::bail!(NO_SOURCES_CONFIGURED);
    }

    let total = candidates.len();
    let sources = BillingCollector::viable(candidates).await;
    if sources.is_empty() {
        anyhow::bail!("none of the {} configured billing sources works", total);
    }

    Ok(AppState::new(
        BillingCollector::new(sources, registry),
        metrics,
        config.server.metrics_path.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_state_requires_a_source() {
        let err = create_app_state(&AppConfig::default(), None)
            .await
            .err()
            .unwrap();

        assert_eq!(err.to_string(), NO_SOURCES_CONFIGURED);
    }
}
