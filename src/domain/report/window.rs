//! Rolling window of parsed per-day reports for one billing period

use super::period::REPORTS_PER_MONTH;
use crate::domain::billing::AggregatedElement;

/// A parsed report kept in its window slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedReport {
    pub key: String,
    pub content_hash: String,
    pub elements: Vec<AggregatedElement>,
}

/// Fixed-size set of report slots tagged with the period prefix they belong to
#[derive(Debug)]
pub struct ReportWindow {
    period_prefix: Option<String>,
    slots: Vec<Option<CachedReport>>,
}

impl Default for ReportWindow {
    fn default() -> Self {
        Self {
            period_prefix: None,
            slots: vec![None; REPORTS_PER_MONTH],
        }
    }
}

impl ReportWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn period_prefix(&self) -> Option<&str> {
        self.period_prefix.as_deref()
    }

    /// Switch to `prefix`, clearing every slot if it differs from the
    /// current one. Returns whether the window was reset.
    pub fn enter_period(&mut self, prefix: &str) -> bool {
        if self.period_prefix.as_deref() == Some(prefix) {
            return false;
        }

        tracing::debug!(
            old = self.period_prefix.as_deref().unwrap_or(""),
            new = prefix,
            "reports prefix changed, clearing report window"
        );
        self.period_prefix = Some(prefix.to_string());
        self.slots = vec![None; REPORTS_PER_MONTH];
        true
    }

    /// Whether `slot` already holds a report with this content hash
    pub fn is_current(&self, slot: usize, content_hash: &str) -> bool {
        self.slots
            .get(slot)
            .and_then(|s| s.as_ref())
            .is_some_and(|r| r.content_hash == content_hash)
    }

    pub fn store(&mut self, slot: usize, report: CachedReport) {
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = Some(report);
        }
    }

    /// Elements of every filled slot, in slot order
    pub fn elements(&self) -> impl Iterator<Item = &AggregatedElement> {
        self.slots.iter().flatten().flat_map(|r| r.elements.iter())
    }

    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
