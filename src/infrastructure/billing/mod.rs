//! Billing sources, the cost counters they feed and the scrape collector

mod aws;
mod bigquery;
mod collector;
mod counters;
mod factory;
mod gcs;
mod source;

pub use aws::{report_prefix, AwsReportSource, CallerIdentity, StsCallerIdentity, AWS_PROVIDER};
pub use bigquery::{monthly_cost_query, BigQueryReportSource, BIGQUERY_BASE_URL};
pub use collector::BillingCollector;
pub use counters::{CostCounters, CostLabels, CostRegistry, CostSample, MONTHLY_COSTS_METRIC};
pub use factory::BillingSourceFactory;
pub use gcs::{GcsReportSource, GCP_PROVIDER};
pub use source::{AccountLabel, ProviderBillingSource};
