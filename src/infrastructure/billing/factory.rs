//! Builds the configured billing sources

use std::sync::Arc;
use std::time::Duration;

use aws_config::{BehaviorVersion, Region};

use super::aws::{AwsReportSource, StsCallerIdentity};
use super::bigquery::BigQueryReportSource;
use super::counters::CostCounters;
use super::gcs::GcsReportSource;
use super::source::{AccountLabel, ProviderBillingSource};
use crate::config::{AppConfig, AwsConfig, GcpConfig};
use crate::domain::{AccountResolver, BillingSource, Clock, DomainError};
use crate::infrastructure::directory::{
    parse_account_map, DirectoryCache, OrganizationsDirectory, OwnerEncoding,
    ResourceManagerDirectory, TagMapping,
};
use crate::infrastructure::gcp::{token_source, TokenSource};
use crate::infrastructure::object_store::{GcsObjectStore, S3ObjectStore};

/// Factory for the billing sources enabled in the configuration
pub struct BillingSourceFactory {
    clock: Arc<dyn Clock>,
    counters: CostCounters,
    http_client: reqwest::Client,
    directory_ttl: Duration,
}

impl BillingSourceFactory {
    pub fn new(config: &AppConfig, clock: Arc<dyn Clock>, counters: CostCounters) -> Self {
        Self {
            clock,
            counters,
            http_client: reqwest::Client::new(),
            directory_ttl: Duration::from_secs(config.directory.ttl_secs),
        }
    }

    /// Every source enabled in `config`, not yet tested
    pub async fn create_all(
        &self,
        config: &AppConfig,
    ) -> Result<Vec<Arc<dyn BillingSource>>, DomainError> {
        let mut sources: Vec<Arc<dyn BillingSource>> = Vec::new();

        if config.aws.enabled() {
            sources.push(self.create_aws(&config.aws).await?);
        }

        if config.gcp.bucket_enabled() && config.gcp.bigquery_enabled() {
            return Err(DomainError::configuration(
                "gcp.bucket_name and gcp.bigquery_table export the same GCP costs; configure only one",
            ));
        }

        if config.gcp.bucket_enabled() || config.gcp.bigquery_enabled() {
            let tokens = token_source(self.http_client.clone(), config.gcp.access_token.as_deref());

            if config.gcp.bucket_enabled() {
                sources.push(self.create_gcs(&config.gcp, Arc::clone(&tokens))?);
            }
            if config.gcp.bigquery_enabled() {
                sources.push(self.create_bigquery(&config.gcp, tokens)?);
            }
        }

        tracing::info!(count = sources.len(), "billing sources configured");
        Ok(sources)
    }

    async fn create_aws(&self, config: &AwsConfig) -> Result<Arc<dyn BillingSource>, DomainError> {
        let bucket = config
            .bucket_name
            .clone()
            .ok_or_else(|| DomainError::configuration("aws.bucket_name is required"))?;

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let store = Arc::new(S3ObjectStore::new(aws_sdk_s3::Client::new(&sdk_config), bucket));
        let identity = Arc::new(StsCallerIdentity::new(aws_sdk_sts::Client::new(&sdk_config)));
        let report = AwsReportSource::new(store, identity)
            .with_root_account_id(config.root_account_id.clone());

        let directory = Arc::new(OrganizationsDirectory::new(
            aws_sdk_organizations::Client::new(&sdk_config),
        ));
        let resolver: Arc<dyn AccountResolver> = Arc::new(
            DirectoryCache::new(directory, Arc::clone(&self.clock), self.directory_ttl)
                .with_overrides(parse_account_map(&config.account_map))
                .with_tags(TagMapping {
                    name_tag: Some(config.name_tag.clone()),
                    owner_tag: Some(config.owner_tag.clone()),
                    owner_encoding: OwnerEncoding::Plain,
                }),
        );

        Ok(Arc::new(
            ProviderBillingSource::new(Arc::new(report), resolver, self.counters.clone())
                .with_account_label(AccountLabel::Name),
        ))
    }

    fn gcp_resolver(&self, config: &GcpConfig, tokens: Arc<dyn TokenSource>) -> Arc<dyn AccountResolver> {
        let directory = Arc::new(ResourceManagerDirectory::new(self.http_client.clone(), tokens));
        Arc::new(
            DirectoryCache::new(directory, Arc::clone(&self.clock), self.directory_ttl).with_tags(
                TagMapping {
                    name_tag: None,
                    owner_tag: Some(config.owner_label.clone()),
                    owner_encoding: OwnerEncoding::Base32,
                },
            ),
        )
    }

    fn create_gcs(
        &self,
        config: &GcpConfig,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Arc<dyn BillingSource>, DomainError> {
        let bucket = config
            .bucket_name
            .clone()
            .ok_or_else(|| DomainError::configuration("gcp.bucket_name is required"))?;

        let store = Arc::new(GcsObjectStore::new(
            self.http_client.clone(),
            Arc::clone(&tokens),
            bucket,
        ));
        let report = GcsReportSource::new(store, Arc::clone(&self.clock), config.report_prefix.clone());

        Ok(Arc::new(
            ProviderBillingSource::new(
                Arc::new(report),
                self.gcp_resolver(config, tokens),
                self.counters.clone(),
            )
            .with_account_label(AccountLabel::Id),
        ))
    }

    fn create_bigquery(
        &self,
        config: &GcpConfig,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Arc<dyn BillingSource>, DomainError> {
        let table = config
            .bigquery_table
            .clone()
            .ok_or_else(|| DomainError::configuration("gcp.bigquery_table is required"))?;
        let project = config.bigquery_project().ok_or_else(|| {
            DomainError::configuration(
                "gcp.bigquery_project is required unless the table is project-qualified",
            )
        })?;

        let report = BigQueryReportSource::new(
            self.http_client.clone(),
            Arc::clone(&tokens),
            Arc::clone(&self.clock),
            project,
            table,
        )?;

        Ok(Arc::new(
            ProviderBillingSource::new(
                Arc::new(report),
                self.gcp_resolver(config, tokens),
                self.counters.clone(),
            )
            .with_account_label(AccountLabel::Id),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::mock::FixedClock;

    fn factory(config: &AppConfig) -> BillingSourceFactory {
        BillingSourceFactory::new(
            config,
            Arc::new(FixedClock::at_date("2017-01-02")),
            CostCounters::new().unwrap(),
        )
    }

    fn gcp_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.gcp.access_token = Some("t0k3n".into());
        config
    }

    #[tokio::test]
    async fn test_nothing_configured() {
        let config = AppConfig::default();
        assert!(factory(&config).create_all(&config).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gcs_source() {
        let mut config = gcp_config();
        config.gcp.bucket_name = Some("acme-billing".into());

        let sources = factory(&config).create_all(&config).await.unwrap();

        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].describe(), "GCP Billing in bucket 'acme-billing'");
        assert_eq!(sources[0].provider(), "gcp");
    }

    #[tokio::test]
    async fn test_bigquery_source() {
        let mut config = gcp_config();
        config.gcp.bigquery_table = Some("acme.billing.export".into());

        let sources = factory(&config).create_all(&config).await.unwrap();

        assert_eq!(sources.len(), 1);
        assert_eq!(
            sources[0].describe(),
            "GCP BigQuery billing export 'acme.billing.export'"
        );
    }

    #[tokio::test]
    async fn test_both_gcp_sources_are_rejected() {
        let mut config = gcp_config();
        config.gcp.bucket_name = Some("acme-billing".into());
        config.gcp.bigquery_table = Some("acme.billing.export".into());

        let result = factory(&config).create_all(&config).await;

        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_bigquery_without_project_is_rejected() {
        let mut config = gcp_config();
        config.gcp.bigquery_table = Some("billing.export".into());

        let result = factory(&config).create_all(&config).await;

        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }
}
