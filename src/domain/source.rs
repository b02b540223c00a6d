//! Billing source contracts

use async_trait::async_trait;

use crate::domain::billing::BillingLineItem;
use crate::domain::report::FetchOutcome;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Provider-specific half of a billing source: locate, download and parse
/// billing data into raw line items
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Cloud label value (`aws`, `gcp`)
    fn provider(&self) -> &'static str;

    /// Fetch line items, or a signal that nothing changed since the last call
    async fn fetch(&self) -> Result<FetchOutcome<Vec<BillingLineItem>>, DomainError>;

    fn describe(&self) -> String;
}

/// A queryable billing source as seen by the collector
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BillingSource: Send + Sync {
    fn provider(&self) -> &'static str;

    /// One full fetch, reduce, resolve and reconcile pass. Counter deltas
    /// are applied as a side effect; nothing is applied on error.
    async fn query(&self) -> Result<(), DomainError>;

    /// Viability check run once at startup
    async fn test(&self) -> Result<(), DomainError>;

    fn describe(&self) -> String;
}
