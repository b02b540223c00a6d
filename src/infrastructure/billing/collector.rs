//! Fan-out over the active billing sources on every scrape

use std::sync::Arc;

use futures::future::join_all;

use super::counters::CostRegistry;
use crate::domain::{BillingSource, DomainError};

/// The set of viable billing sources sharing one cost registry
#[derive(Clone)]
pub struct BillingCollector {
    sources: Vec<Arc<dyn BillingSource>>,
    registry: CostRegistry,
}

impl BillingCollector {
    pub fn new(sources: Vec<Arc<dyn BillingSource>>, registry: CostRegistry) -> Self {
        Self { sources, registry }
    }

    /// Run `test()` on every candidate concurrently and keep the ones that pass
    pub async fn viable(candidates: Vec<Arc<dyn BillingSource>>) -> Vec<Arc<dyn BillingSource>> {
        let checks = candidates.into_iter().map(|source| async move {
            match source.test().await {
                Ok(()) => {
                    tracing::info!(source = %source.describe(), "billing source is working");
                    Some(source)
                }
                Err(e) => {
                    tracing::error!(source = %source.describe(), error = %e, "excluding billing source");
                    None
                }
            }
        });

        join_all(checks).await.into_iter().flatten().collect()
    }

    pub fn sources(&self) -> &[Arc<dyn BillingSource>] {
        &self.sources
    }

    pub fn registry(&self) -> &CostRegistry {
        &self.registry
    }

    /// Query every source in parallel and wait for all of them. Failures are
    /// logged; counters of a failed source keep their previous values.
    pub async fn scrape(&self) -> usize {
        let queries = self.sources.iter().map(|source| async move {
            let result = source.query().await;
            if let Err(e) = &result {
                tracing::warn!(
                    source = %source.describe(),
                    error = %e,
                    "Error querying billing source"
                );
            }
            result.is_ok()
        });

        join_all(queries).await.into_iter().filter(|ok| !ok).count()
    }

    /// Scrape, then render the cost counters
    pub async fn collect(&self) -> Result<String, DomainError> {
        let failed = self.scrape().await;
        if failed > 0 {
            tracing::debug!(failed, total = self.sources.len(), "scrape finished with errors");
        }
        self.registry.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::source::MockBillingSource;
    use crate::infrastructure::billing::counters::CostLabels;
    use rust_decimal_macros::dec;

    fn working(name: &'static str) -> MockBillingSource {
        let mut source = MockBillingSource::new();
        source.expect_describe().returning(move || name.to_string());
        source.expect_test().returning(|| Ok(()));
        source
    }

    fn broken(name: &'static str) -> MockBillingSource {
        let mut source = MockBillingSource::new();
        source.expect_describe().returning(move || name.to_string());
        source
            .expect_test()
            .returning(|| Err(DomainError::object_store("no such bucket")));
        source
    }

    #[tokio::test]
    async fn test_viable_excludes_failing_sources() {
        let candidates: Vec<Arc<dyn BillingSource>> =
            vec![Arc::new(working("aws")), Arc::new(broken("gcp"))];

        let viable = BillingCollector::viable(candidates).await;

        assert_eq!(viable.len(), 1);
        assert_eq!(viable[0].describe(), "aws");
    }

    #[tokio::test]
    async fn test_scrape_queries_every_source() {
        let mut ok = working("aws");
        ok.expect_query().times(1).returning(|| Ok(()));
        let mut failing = working("gcp");
        failing
            .expect_query()
            .times(1)
            .returning(|| Err(DomainError::object_store("timeout")));
        let collector = BillingCollector::new(
            vec![Arc::new(ok), Arc::new(failing)],
            CostRegistry::new().unwrap(),
        );

        assert_eq!(collector.scrape().await, 1);
    }

    #[tokio::test]
    async fn test_collect_renders_existing_counters_after_failure() {
        let mut failing = working("aws");
        failing
            .expect_query()
            .returning(|| Err(DomainError::object_store("timeout")));
        let registry = CostRegistry::new().unwrap();
        registry.counters().add(
            &CostLabels {
                cloud: "aws".into(),
                currency: "USD".into(),
                account: "acme-dev".into(),
                service: "S3".into(),
                ..Default::default()
            },
            dec!(3),
        );
        let collector = BillingCollector::new(vec![Arc::new(failing)], registry);

        let text = collector.collect().await.unwrap();

        assert!(text.contains(r#"account="acme-dev""#));
    }
}
