//! Observability configuration

use serde::Deserialize;

/// Main observability configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Self-instrumentation metrics configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Export exporter metrics (query counts, durations) next to the costs
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_observability_config() {
        let config = ObservabilityConfig::default();
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_metrics_config_deserialize_defaults() {
        let config: ObservabilityConfig = serde_json::from_str(r#"{"metrics": {}}"#).unwrap();
        assert!(config.metrics.enabled);

        let config: ObservabilityConfig =
            serde_json::from_str(r#"{"metrics": {"enabled": false}}"#).unwrap();
        assert!(!config.metrics.enabled);
    }
}
