//! Provider-independent billing source: fetch, reduce, resolve, reconcile

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::counters::{CostCounters, CostLabels};
use crate::domain::billing::{reconcile, reduce, CounterState};
use crate::domain::{
    Account, AccountResolver, BillingSource, DomainError, FetchOutcome, QueryStage, ReportSource,
};
use crate::infrastructure::observability::{record_counter_regressions, record_source_query};

/// Which account attribute goes into the `account` label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountLabel {
    /// Resolved display name
    #[default]
    Name,
    /// Raw account / project id
    Id,
}

impl AccountLabel {
    fn value<'a>(&self, account: &'a Account) -> &'a str {
        match self {
            Self::Name => &account.name,
            Self::Id => &account.id,
        }
    }
}

/// A [`ReportSource`] wired to the shared reducer, directory cache and
/// reconciler. Owns the counter state of its provider.
pub struct ProviderBillingSource {
    report: Arc<dyn ReportSource>,
    resolver: Arc<dyn AccountResolver>,
    counters: CostCounters,
    account_label: AccountLabel,
    state: Mutex<CounterState>,
}

impl ProviderBillingSource {
    pub fn new(
        report: Arc<dyn ReportSource>,
        resolver: Arc<dyn AccountResolver>,
        counters: CostCounters,
    ) -> Self {
        Self {
            report,
            resolver,
            counters,
            account_label: AccountLabel::default(),
            state: Mutex::new(CounterState::new()),
        }
    }

    pub fn with_account_label(mut self, account_label: AccountLabel) -> Self {
        self.account_label = account_label;
        self
    }

    /// Number of grouping keys observed so far
    pub async fn tracked_keys(&self) -> usize {
        self.state.lock().await.len()
    }

    async fn run(&self) -> Result<(), DomainError> {
        let provider = self.report.provider();

        let items = match self.report.fetch().await {
            Ok(FetchOutcome::Fresh(items)) => items,
            Ok(FetchOutcome::Unchanged) => {
                tracing::debug!(provider, "billing data unchanged");
                return Ok(());
            }
            Ok(FetchOutcome::Empty) => {
                tracing::debug!(provider, "no billing data available yet");
                return Ok(());
            }
            Err(e) => return Err(with_stage(provider, e)),
        };

        let aggregated = reduce(&items);

        let mut accounts: HashMap<&str, Account> = HashMap::new();
        for element in &aggregated {
            if !accounts.contains_key(element.account_id()) {
                let account = self.resolver.resolve(element.account_id()).await;
                accounts.insert(element.account_id(), account);
            }
        }

        let mut state = self.state.lock().await;
        let reconciliation = reconcile(&aggregated, &mut state);

        for delta in &reconciliation.deltas {
            let account = accounts
                .get(delta.key.account_id.as_str())
                .cloned()
                .unwrap_or_else(|| Account::unknown(&delta.key.account_id));

            let labels = CostLabels {
                cloud: provider.to_string(),
                currency: delta.key.currency.clone(),
                account: self.account_label.value(&account).to_string(),
                service: delta.key.service_name.clone(),
                path: account.path_label(),
                owner: account.owner.clone(),
            };
            self.counters.add(&labels, delta.delta);
        }

        record_counter_regressions(provider, reconciliation.regressions.len());
        tracing::debug!(
            provider,
            elements = aggregated.len(),
            changed = reconciliation.non_zero().count(),
            regressions = reconciliation.regressions.len(),
            "billing counters reconciled"
        );

        Ok(())
    }
}

/// Attach the failing stage unless the source already did
fn with_stage(provider: &str, error: DomainError) -> DomainError {
    match error {
        DomainError::Query { .. } => error,
        DomainError::Parse { .. } => DomainError::query(provider, QueryStage::Parse, error),
        _ => DomainError::query(provider, QueryStage::Fetch, error),
    }
}

#[async_trait]
impl BillingSource for ProviderBillingSource {
    fn provider(&self) -> &'static str {
        self.report.provider()
    }

    async fn query(&self) -> Result<(), DomainError> {
        let started = Instant::now();
        let result = self.run().await;
        record_source_query(self.report.provider(), result.is_ok(), started.elapsed());
        result
    }

    async fn test(&self) -> Result<(), DomainError> {
        self.query().await
    }

    fn describe(&self) -> String {
        self.report.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::directory::MockAccountResolver;
    use crate::domain::BillingLineItem;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    type Outcome = Result<FetchOutcome<Vec<BillingLineItem>>, DomainError>;

    /// Report source replaying a fixed list of fetch outcomes
    struct ScriptedReport {
        outcomes: StdMutex<VecDeque<Outcome>>,
    }

    impl ScriptedReport {
        fn new(outcomes: Vec<Outcome>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: StdMutex::new(outcomes.into()),
            })
        }
    }

    #[async_trait]
    impl ReportSource for ScriptedReport {
        fn provider(&self) -> &'static str {
            "aws"
        }

        async fn fetch(&self) -> Outcome {
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(FetchOutcome::Unchanged))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn resolver() -> Arc<MockAccountResolver> {
        let mut resolver = MockAccountResolver::new();
        resolver.expect_resolve().returning(|id| {
            Account::new(id, format!("name-{}", id))
                .with_owner("jane")
                .with_path(vec!["example.com".into(), "eng".into()])
        });
        Arc::new(resolver)
    }

    fn fresh(items: Vec<BillingLineItem>) -> Outcome {
        Ok(FetchOutcome::Fresh(items))
    }

    fn s3(cost: Decimal) -> BillingLineItem {
        BillingLineItem::new("1234", "S3", cost, "USD")
    }

    fn source(outcomes: Vec<Outcome>) -> (ProviderBillingSource, CostCounters) {
        let counters = CostCounters::new().unwrap();
        let source = ProviderBillingSource::new(ScriptedReport::new(outcomes), resolver(), counters.clone());
        (source, counters)
    }

    fn value(counters: &CostCounters) -> f64 {
        counters.samples().iter().map(|s| s.value).sum()
    }

    #[tokio::test]
    async fn test_query_applies_reduced_costs_with_labels() {
        let (source, counters) = source(vec![fresh(vec![s3(dec!(10)), s3(dec!(2.5))])]);

        source.query().await.unwrap();

        let samples = counters.samples();
        assert_eq!(samples.len(), 1);
        assert_eq!(
            samples[0].labels,
            CostLabels {
                cloud: "aws".into(),
                currency: "USD".into(),
                account: "name-1234".into(),
                service: "S3".into(),
                path: "example.com/eng".into(),
                owner: "jane".into(),
            }
        );
        assert_eq!(samples[0].value, 12.5);
    }

    #[tokio::test]
    async fn test_account_id_label() {
        let counters = CostCounters::new().unwrap();
        let source = ProviderBillingSource::new(
            ScriptedReport::new(vec![fresh(vec![s3(dec!(1))])]),
            resolver(),
            counters.clone(),
        )
        .with_account_label(AccountLabel::Id);

        source.query().await.unwrap();

        assert_eq!(counters.samples()[0].labels.account, "1234");
    }

    #[tokio::test]
    async fn test_counters_grow_by_delta() {
        let (source, counters) = source(vec![
            fresh(vec![s3(dec!(10))]),
            fresh(vec![s3(dec!(15))]),
        ]);

        source.query().await.unwrap();
        source.query().await.unwrap();

        assert_eq!(value(&counters), 15.0);
    }

    #[tokio::test]
    async fn test_unchanged_report_changes_nothing() {
        let (source, counters) = source(vec![
            fresh(vec![s3(dec!(10))]),
            Ok(FetchOutcome::Unchanged),
            Ok(FetchOutcome::Empty),
        ]);

        for _ in 0..3 {
            source.query().await.unwrap();
        }

        assert_eq!(value(&counters), 10.0);
        assert_eq!(source.tracked_keys().await, 1);
    }

    #[tokio::test]
    async fn test_cost_regression_keeps_counter() {
        let (source, counters) = source(vec![
            fresh(vec![s3(dec!(100))]),
            fresh(vec![s3(dec!(80))]),
            fresh(vec![s3(dec!(120))]),
        ]);

        source.query().await.unwrap();
        source.query().await.unwrap();
        assert_eq!(value(&counters), 100.0);

        source.query().await.unwrap();
        assert_eq!(value(&counters), 120.0);
    }

    #[tokio::test]
    async fn test_fetch_error_names_stage_and_applies_nothing() {
        let (source, counters) = source(vec![
            fresh(vec![s3(dec!(10))]),
            Err(DomainError::object_store("access denied")),
        ]);

        source.query().await.unwrap();
        let err = source.query().await.unwrap_err();

        assert_eq!(err.stage(), Some(QueryStage::Fetch));
        assert!(err.to_string().starts_with("aws query failed during fetch"));
        assert_eq!(value(&counters), 10.0);
    }

    #[tokio::test]
    async fn test_parse_error_stage() {
        let (source, _) = source(vec![Err(DomainError::parse("no TotalCost column"))]);

        let err = source.test().await.unwrap_err();

        assert_eq!(err.stage(), Some(QueryStage::Parse));
    }

    #[tokio::test]
    async fn test_stage_from_source_is_kept() {
        let (source, _) = source(vec![Err(DomainError::query(
            "aws",
            QueryStage::Identity,
            DomainError::authentication("no credentials"),
        ))]);

        let err = source.query().await.unwrap_err();

        assert_eq!(err.stage(), Some(QueryStage::Identity));
    }

    #[tokio::test]
    async fn test_concurrent_queries_apply_each_delta_once() {
        let (source, counters) = source(vec![
            fresh(vec![s3(dec!(10))]),
            fresh(vec![s3(dec!(10))]),
        ]);
        let source = Arc::new(source);

        let (a, b) = tokio::join!(source.query(), source.query());
        a.unwrap();
        b.unwrap();

        assert_eq!(value(&counters), 10.0);
    }

    #[tokio::test]
    async fn test_describe_delegates() {
        let (source, _) = source(vec![]);
        assert_eq!(source.describe(), "scripted");
        assert_eq!(BillingSource::provider(&source), "aws");
    }
}
