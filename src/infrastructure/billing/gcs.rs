//! GCP billing export files in a GCS bucket

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::billing::as_line_items;
use crate::domain::report::{parse_json_report, FetchOutcome, RollingWindowFetcher};
use crate::domain::{BillingLineItem, Clock, DomainError, ObjectStore, ReportSource};

pub const GCP_PROVIDER: &str = "gcp";

/// Daily JSON export files of the current billing month
pub struct GcsReportSource<S: ObjectStore> {
    fetcher: RollingWindowFetcher<S>,
}

impl<S: ObjectStore + 'static> GcsReportSource<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, report_prefix: impl Into<String>) -> Self {
        Self {
            fetcher: RollingWindowFetcher::new(store, clock, report_prefix),
        }
    }
}

#[async_trait]
impl<S: ObjectStore + 'static> ReportSource for GcsReportSource<S> {
    fn provider(&self) -> &'static str {
        GCP_PROVIDER
    }

    async fn fetch(&self) -> Result<FetchOutcome<Vec<BillingLineItem>>, DomainError> {
        let outcome = self.fetcher.fetch(parse_json_report).await?;
        Ok(outcome.map(|elements| as_line_items(&elements)))
    }

    fn describe(&self) -> String {
        format!("GCP Billing in bucket '{}'", self.fetcher.store().bucket())
    }
}
