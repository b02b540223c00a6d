//! AWS detailed billing reports in S3

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_sts::Client as StsClient;
use tokio::sync::OnceCell;

use crate::domain::report::{parse_csv_report, FetchOutcome, LatestObjectFetcher};
use crate::domain::{BillingLineItem, DomainError, ObjectStore, QueryStage, ReportSource};

pub const AWS_PROVIDER: &str = "aws";

/// Identity of the credentials in use
#[async_trait]
pub trait CallerIdentity: Send + Sync {
    async fn account_id(&self) -> Result<String, DomainError>;
}

/// STS `GetCallerIdentity`
#[derive(Debug, Clone)]
pub struct StsCallerIdentity {
    client: StsClient,
}

impl StsCallerIdentity {
    pub fn new(client: StsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CallerIdentity for StsCallerIdentity {
    async fn account_id(&self) -> Result<String, DomainError> {
        let output = self
            .client
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| DomainError::authentication(format!("STS GetCallerIdentity failed: {}", e)))?;

        output
            .account()
            .map(str::to_string)
            .ok_or_else(|| DomainError::authentication("caller identity has no account"))
    }
}

/// Report key prefix for a payer (root) account
pub fn report_prefix(root_account_id: &str) -> String {
    format!("{}-aws-billing-csv-", root_account_id)
}

/// The newest monthly CSV report of the organization's root account
pub struct AwsReportSource<S: ObjectStore> {
    fetcher: LatestObjectFetcher<S>,
    identity: Arc<dyn CallerIdentity>,
    root_account_id: OnceCell<String>,
}

impl<S: ObjectStore> AwsReportSource<S> {
    pub fn new(store: Arc<S>, identity: Arc<dyn CallerIdentity>) -> Self {
        Self {
            fetcher: LatestObjectFetcher::new(store),
            identity,
            root_account_id: OnceCell::new(),
        }
    }

    /// Use a configured root account instead of asking STS
    pub fn with_root_account_id(self, root_account_id: Option<String>) -> Self {
        match root_account_id.filter(|id| !id.is_empty()) {
            Some(id) => Self {
                root_account_id: OnceCell::new_with(Some(id)),
                ..self
            },
            None => self,
        }
    }

    async fn root_account_id(&self) -> Result<&str, DomainError> {
        self.root_account_id
            .get_or_try_init(|| self.identity.account_id())
            .await
            .map(String::as_str)
            .map_err(|e| {
                DomainError::query(
                    AWS_PROVIDER,
                    QueryStage::Identity,
                    DomainError::authentication(format!("Error detecting root account ID: {}", e)),
                )
            })
    }
}

#[async_trait]
impl<S: ObjectStore + 'static> ReportSource for AwsReportSource<S> {
    fn provider(&self) -> &'static str {
        AWS_PROVIDER
    }

    async fn fetch(&self) -> Result<FetchOutcome<Vec<BillingLineItem>>, DomainError> {
        let root_account_id = self.root_account_id().await?;
        let prefix = report_prefix(root_account_id);

        let outcome = self.fetcher.fetch(&prefix, parse_csv_report).await?;
        if matches!(outcome, FetchOutcome::Empty) {
            tracing::warn!(
                root_account_id,
                bucket = self.fetcher.store().bucket(),
                "no billing report found"
            );
        }
        Ok(outcome)
    }

    fn describe(&self) -> String {
        format!(
            "AWS Billing on root account '{}' in bucket '{}'",
            self.root_account_id.get().map(String::as_str).unwrap_or("<unresolved>"),
            self.fetcher.store().bucket()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::object_store::mock::FakeObjectStore;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const REPORT: &str = "RecordType,LinkedAccountId,ProductCode,TotalCost,CurrencyCode\n\
                          LinkedLineItem,1234,S3,12.50,USD\n\
                          Tax,1234,S3,1.00,USD\n";

    struct FixedIdentity {
        account: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl FixedIdentity {
        fn new(account: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                account,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CallerIdentity for FixedIdentity {
        async fn account_id(&self) -> Result<String, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.account
                .map(str::to_string)
                .ok_or_else(|| DomainError::authentication("no credentials"))
        }
    }

    fn store() -> Arc<FakeObjectStore> {
        let store = Arc::new(FakeObjectStore::new());
        store.put("999-aws-billing-csv-2017-01.csv", "etag-1", "RecordType\n");
        store.put("999-aws-billing-csv-2017-02.csv", "etag-2", REPORT);
        store.put("111-aws-billing-csv-2017-03.csv", "etag-3", REPORT);
        store
    }

    #[test]
    fn test_report_prefix() {
        assert_eq!(report_prefix("123456789012"), "123456789012-aws-billing-csv-");
    }

    #[tokio::test]
    async fn test_fetches_latest_report_of_discovered_root() {
        let identity = FixedIdentity::new(Some("999"));
        let source = AwsReportSource::new(store(), identity.clone());

        let outcome = source.fetch().await.unwrap();
        source.fetch().await.unwrap();

        assert_eq!(
            outcome,
            FetchOutcome::Fresh(vec![BillingLineItem::new("1234", "S3", dec!(12.50), "USD")])
        );
        assert_eq!(identity.calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.describe(), "AWS Billing on root account '999' in bucket 'test-bucket'");
    }

    #[tokio::test]
    async fn test_configured_root_skips_sts() {
        let identity = FixedIdentity::new(None);
        let source = AwsReportSource::new(store(), identity.clone())
            .with_root_account_id(Some("111".into()));

        assert!(source.fetch().await.unwrap().is_fresh());
        assert_eq!(identity.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_identity_failure_is_identity_stage() {
        let source = AwsReportSource::new(store(), FixedIdentity::new(None));

        let err = source.fetch().await.unwrap_err();

        assert_eq!(err.stage(), Some(QueryStage::Identity));
        assert!(source.describe().contains("<unresolved>"));
    }

    #[tokio::test]
    async fn test_unchanged_etag() {
        let source = AwsReportSource::new(store(), FixedIdentity::new(Some("999")));

        source.fetch().await.unwrap();

        assert_eq!(source.fetch().await.unwrap(), FetchOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_no_reports_is_empty() {
        let source = AwsReportSource::new(store(), FixedIdentity::new(Some("555")));

        assert_eq!(source.fetch().await.unwrap(), FetchOutcome::Empty);
    }
}
