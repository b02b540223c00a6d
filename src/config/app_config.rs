use serde::Deserialize;

use crate::infrastructure::observability::ObservabilityConfig;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub gcp: GcpConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path under which the metrics are exposed
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// AWS billing reports; enabled when `bucket_name` is set
#[derive(Debug, Clone, Deserialize)]
pub struct AwsConfig {
    #[serde(default)]
    pub bucket_name: Option<String>,
    #[serde(default = "default_aws_region")]
    pub region: String,
    /// Payer account; discovered through STS when unset
    #[serde(default)]
    pub root_account_id: Option<String>,
    /// `ID=name,ID=name` display name overrides
    #[serde(default)]
    pub account_map: String,
    #[serde(default = "default_owner_tag")]
    pub owner_tag: String,
    #[serde(default = "default_name_tag")]
    pub name_tag: String,
}

/// GCP billing export; the GCS source is enabled when `bucket_name` is
/// set, the BigQuery source when `bigquery_table` is set
#[derive(Debug, Clone, Deserialize)]
pub struct GcpConfig {
    #[serde(default)]
    pub bucket_name: Option<String>,
    #[serde(default = "default_report_prefix")]
    pub report_prefix: String,
    /// Project label holding the base32 encoded owner
    #[serde(default = "default_owner_label")]
    pub owner_label: String,
    #[serde(default)]
    pub bigquery_table: Option<String>,
    /// Project the BigQuery jobs run in; defaults to the table's project
    #[serde(default)]
    pub bigquery_project: Option<String>,
    /// Static OAuth token; the metadata server is used when unset
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// How long resolved account metadata is reused
    #[serde(default = "default_directory_ttl")]
    pub ttl_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9660
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

fn default_aws_region() -> String {
    "eu-west-1".to_string()
}

fn default_owner_tag() -> String {
    "owner".to_string()
}

fn default_name_tag() -> String {
    "project-id".to_string()
}

fn default_report_prefix() -> String {
    "my-billing".to_string()
}

fn default_owner_label() -> String {
    "owner-base32".to_string()
}

fn default_directory_ttl() -> u64 {
    3600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            metrics_path: default_metrics_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            bucket_name: None,
            region: default_aws_region(),
            root_account_id: None,
            account_map: String::new(),
            owner_tag: default_owner_tag(),
            name_tag: default_name_tag(),
        }
    }
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            bucket_name: None,
            report_prefix: default_report_prefix(),
            owner_label: default_owner_label(),
            bigquery_table: None,
            bigquery_project: None,
            access_token: None,
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_directory_ttl(),
        }
    }
}

impl AwsConfig {
    pub fn enabled(&self) -> bool {
        self.bucket_name.as_deref().is_some_and(|b| !b.is_empty())
    }
}

impl GcpConfig {
    pub fn bucket_enabled(&self) -> bool {
        self.bucket_name.as_deref().is_some_and(|b| !b.is_empty())
    }

    pub fn bigquery_enabled(&self) -> bool {
        self.bigquery_table.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Project billed for BigQuery jobs: configured, or the project part
    /// of a fully qualified table name
    pub fn bigquery_project(&self) -> Option<&str> {
        if let Some(project) = self.bigquery_project.as_deref().filter(|p| !p.is_empty()) {
            return Some(project);
        }
        let table = self.bigquery_table.as_deref()?;
        let parts: Vec<&str> = table.split('.').collect();
        (parts.len() == 3).then(|| parts[0])
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(None)
    }

    /// Layered load: defaults file, local file (or `path`), then `APP__*`
    /// environment variables
    pub fn load_from(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        builder = match path {
            Some(path) => builder.add_source(config::File::with_name(path).required(true)),
            None => builder.add_source(config::File::with_name("config/local").required(false)),
        };

        let config = builder
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> AppConfig {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = from_toml("");

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9660);
        assert_eq!(config.server.metrics_path, "/metrics");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.aws.region, "eu-west-1");
        assert_eq!(config.aws.name_tag, "project-id");
        assert_eq!(config.gcp.report_prefix, "my-billing");
        assert_eq!(config.gcp.owner_label, "owner-base32");
        assert_eq!(config.directory.ttl_secs, 3600);
        assert!(config.observability.metrics.enabled);
        assert!(!config.aws.enabled());
        assert!(!config.gcp.bucket_enabled());
        assert!(!config.gcp.bigquery_enabled());
    }

    #[test]
    fn test_sections() {
        let config = from_toml(
            r#"
            [server]
            port = 9999
            [logging]
            format = "json"
            [aws]
            bucket_name = "acme-billing"
            root_account_id = "123456789012"
            account_map = "1=dev"
            [gcp]
            bucket_name = "acme-gcp-billing"
            bigquery_table = "acme.billing.export"
            "#,
        );

        assert_eq!(config.server.port, 9999);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.aws.enabled());
        assert_eq!(config.aws.root_account_id.as_deref(), Some("123456789012"));
        assert!(config.gcp.bucket_enabled());
        assert!(config.gcp.bigquery_enabled());
        assert_eq!(config.gcp.bigquery_project(), Some("acme"));
    }

    #[test]
    fn test_bigquery_project() {
        let mut gcp = GcpConfig {
            bigquery_table: Some("billing.export".into()),
            ..Default::default()
        };
        assert_eq!(gcp.bigquery_project(), None);

        gcp.bigquery_project = Some("jobs-project".into());
        assert_eq!(gcp.bigquery_project(), Some("jobs-project"));
    }

    #[test]
    fn test_empty_bucket_disables_source() {
        let aws = AwsConfig {
            bucket_name: Some(String::new()),
            ..Default::default()
        };
        assert!(!aws.enabled());
    }
}
