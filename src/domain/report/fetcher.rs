//! Report fetchers: locate report objects, skip unchanged content, parse
//! what changed

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;

use super::period::{monthly_prefixes, report_slot};
use super::window::{CachedReport, ReportWindow};
use crate::domain::billing::{as_line_items, reduce, AggregatedElement, BillingLineItem};
use crate::domain::clock::Clock;
use crate::domain::object_store::{ObjectInfo, ObjectStore};
use crate::domain::DomainError;

/// Result of one fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    /// No matching report exists yet
    Empty,
    /// The relevant report(s) have not changed since the last fetch
    Unchanged,
    /// Changed content, parsed
    Fresh(T),
}

impl<T> FetchOutcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchOutcome<U> {
        match self {
            Self::Empty => FetchOutcome::Empty,
            Self::Unchanged => FetchOutcome::Unchanged,
            Self::Fresh(t) => FetchOutcome::Fresh(f(t)),
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }
}

/// Parser for a downloaded report body
pub type ReportParser = fn(&[u8]) -> Result<Vec<BillingLineItem>, DomainError>;

/// Fetches the lexicographically greatest object under a prefix, for
/// single-file reports whose keys carry a sortable date suffix
pub struct LatestObjectFetcher<S: ObjectStore> {
    store: Arc<S>,
    last_hash: Mutex<Option<String>>,
}

impl<S: ObjectStore> LatestObjectFetcher<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            last_hash: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Hash of the last successfully parsed object
    pub async fn last_hash(&self) -> Option<String> {
        self.last_hash.lock().await.clone()
    }

    /// Download and parse the newest object under `prefix` if its content
    /// hash differs from the last parsed one.
    ///
    /// The hash is only recorded after `parse` succeeds, so a failed parse
    /// is retried on the next fetch.
    pub async fn fetch(
        &self,
        prefix: &str,
        parse: ReportParser,
    ) -> Result<FetchOutcome<Vec<BillingLineItem>>, DomainError> {
        let objects = self.store.list(prefix).await?;
        for object in &objects {
            tracing::debug!(key = %object.key, hash = %object.content_hash, "found report");
        }

        let Some(latest) = objects.into_iter().max_by(|a, b| a.key.cmp(&b.key)) else {
            return Ok(FetchOutcome::Empty);
        };

        let mut last_hash = self.last_hash.lock().await;
        if last_hash.as_deref() == Some(latest.content_hash.as_str()) {
            tracing::debug!(key = %latest.key, "report has already been parsed");
            return Ok(FetchOutcome::Unchanged);
        }

        tracing::debug!(key = %latest.key, hash = %latest.content_hash, "using report");
        let body = self.store.get(&latest.key).await?;
        let items = parse(&body).map_err(|e| {
            DomainError::parse(format!("Error parsing billing report '{}': {}", latest.key, e))
        })?;

        *last_hash = Some(latest.content_hash);
        Ok(FetchOutcome::Fresh(items))
    }
}

/// Fetches every per-day report of the current (or, when that is empty,
/// the previous) billing month into a fixed-size window of slots
pub struct RollingWindowFetcher<S: ObjectStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    report_prefix: String,
    window: Mutex<ReportWindow>,
}

impl<S: ObjectStore + 'static> RollingWindowFetcher<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, report_prefix: impl Into<String>) -> Self {
        Self {
            store,
            clock,
            report_prefix: report_prefix.into(),
            window: Mutex::new(ReportWindow::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn report_prefix(&self) -> &str {
        &self.report_prefix
    }

    /// Number of window slots currently holding a parsed report
    pub async fn cached_reports(&self) -> usize {
        self.window.lock().await.filled()
    }

    /// Refresh the window and return the reduced snapshot of all slots.
    ///
    /// Objects whose hash matches their slot are not downloaded again.
    /// Objects with unusable names or failing downloads/parses are logged
    /// and skipped. Returns `Unchanged` when no slot changed.
    pub async fn fetch(
        &self,
        parse: ReportParser,
    ) -> Result<FetchOutcome<Vec<AggregatedElement>>, DomainError> {
        let mut window = self.window.lock().await;

        let Some((prefix, objects)) = self.find_period().await? else {
            tracing::warn!(
                bucket = self.store.bucket(),
                prefix = %self.report_prefix,
                "no reports of this or last month found"
            );
            return Ok(FetchOutcome::Empty);
        };

        let reset = window.enter_period(&prefix);

        let pending: Vec<(usize, ObjectInfo)> = objects
            .into_iter()
            .filter_map(|object| match report_slot(&object.key) {
                Some(slot) => Some((slot, object)),
                None => {
                    tracing::warn!(key = %object.key, "invalid report filename");
                    None
                }
            })
            .filter(|(slot, object)| {
                let cached = window.is_current(*slot, &object.content_hash);
                if cached {
                    tracing::debug!(key = %object.key, "report already parsed in cache");
                }
                !cached
            })
            .collect();

        let downloads = pending.into_iter().map(|(slot, object)| {
            let store = Arc::clone(&self.store);
            async move {
                let report = download_report(store.as_ref(), &object, parse).await;
                (slot, object, report)
            }
        });

        let mut changed = reset;
        for (slot, object, report) in join_all(downloads).await {
            match report {
                Ok(report) => {
                    window.store(slot, report);
                    changed = true;
                }
                Err(e) => tracing::warn!(key = %object.key, error = %e, "failed to load report"),
            }
        }

        if !changed {
            return Ok(FetchOutcome::Unchanged);
        }

        let elements: Vec<AggregatedElement> = window.elements().cloned().collect();
        Ok(FetchOutcome::Fresh(reduce(&as_line_items(&elements))))
    }

    /// First period prefix (current month, then previous) with any objects
    async fn find_period(&self) -> Result<Option<(String, Vec<ObjectInfo>)>, DomainError> {
        for prefix in monthly_prefixes(&self.report_prefix, self.clock.now()) {
            tracing::debug!(bucket = self.store.bucket(), prefix = %prefix, "looking for reports");
            let objects = self.store.list(&prefix).await?;
            if !objects.is_empty() {
                return Ok(Some((prefix, objects)));
            }
        }
        Ok(None)
    }
}

async fn download_report<S: ObjectStore + ?Sized>(
    store: &S,
    object: &ObjectInfo,
    parse: ReportParser,
) -> Result<CachedReport, DomainError> {
    let body = store.get(&object.key).await?;
    let items = parse(&body)?;
    let elements = reduce(&items);

    for element in &elements {
        tracing::debug!(
            report = %object.key,
            account = element.account_id(),
            service = element.service_name(),
            currency = element.currency(),
            cost = %element.cumulative_cost,
            "parsed report element"
        );
    }

    Ok(CachedReport {
        key: object.key.clone(),
        content_hash: object.content_hash.clone(),
        elements,
    })
}
