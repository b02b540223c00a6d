//! Check command - tests every configured source once

use std::sync::Arc;

use futures::future::join_all;

use super::Cli;
use crate::domain::BillingSource;
use crate::infrastructure::billing::CostRegistry;
use crate::infrastructure::logging::init_logging;

pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = cli.load_config()?;
    init_logging(&config.logging);

    let registry = CostRegistry::new()?;
    let candidates = crate::create_sources(&config, &registry).await?;
    if candidates.is_empty() {
        anyhow::bail!(crate::NO_SOURCES_CONFIGURED);
    }

    let results = test_all(&candidates).await;
    for (description, result) in &results {
        match result {
            Ok(()) => println!("ok      {}", description),
            Err(e) => println!("FAILED  {}: {}", description, e),
        }
    }

    let working = results.iter().filter(|(_, result)| result.is_ok()).count();
    if working == 0 {
        anyhow::bail!("none of the {} configured billing sources works", results.len());
    }

    println!("{}/{} billing sources working", working, results.len());
    Ok(())
}

/// Test every source concurrently, keeping the configuration order
async fn test_all(
    sources: &[Arc<dyn BillingSource>],
) -> Vec<(String, Result<(), crate::domain::DomainError>)> {
    join_all(
        sources
            .iter()
            .map(|source| async move { (source.describe(), source.test().await) }),
    )
    .await
}
