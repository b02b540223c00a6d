//! Exported monthly cost counters

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{CounterVec, Encoder, Opts, Registry, TextEncoder};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::DomainError;

pub const MONTHLY_COSTS_METRIC: &str = "cloud_billing_monthly_costs";
const MONTHLY_COSTS_HELP: &str = "Billed costs per calendar month.";
const LABELS: [&str; 6] = ["cloud", "currency", "account", "service", "path", "owner"];

/// Label values of one cost counter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CostLabels {
    pub cloud: String,
    pub currency: String,
    pub account: String,
    pub service: String,
    pub path: String,
    pub owner: String,
}

impl CostLabels {
    fn values(&self) -> [&str; 6] {
        [
            self.cloud.as_str(),
            self.currency.as_str(),
            self.account.as_str(),
            self.service.as_str(),
            self.path.as_str(),
            self.owner.as_str(),
        ]
    }
}

/// Current value of one labeled counter
#[derive(Debug, Clone, PartialEq)]
pub struct CostSample {
    pub labels: CostLabels,
    pub value: f64,
}

/// Monotonic cost counters shared by all billing sources
#[derive(Clone)]
pub struct CostCounters {
    counters: CounterVec,
}

impl CostCounters {
    pub fn new() -> Result<Self, DomainError> {
        let counters = CounterVec::new(Opts::new(MONTHLY_COSTS_METRIC, MONTHLY_COSTS_HELP), &LABELS)?;
        Ok(Self { counters })
    }

    /// Increase the counter for `labels` by a non-negative delta
    pub fn add(&self, labels: &CostLabels, delta: Decimal) {
        let Some(delta) = delta.to_f64().filter(|d| *d >= 0.0) else {
            tracing::warn!(?labels, %delta, "refusing to apply cost delta");
            return;
        };
        self.counters.with_label_values(&labels.values()).inc_by(delta);
    }

    /// Snapshot of every labeled counter
    pub fn samples(&self) -> Vec<CostSample> {
        self.counters
            .collect()
            .iter()
            .flat_map(|family| family.get_metric())
            .map(|metric| {
                let mut labels = CostLabels::default();
                for pair in metric.get_label() {
                    let value = pair.get_value().to_string();
                    match pair.get_name() {
                        "cloud" => labels.cloud = value,
                        "currency" => labels.currency = value,
                        "account" => labels.account = value,
                        "service" => labels.service = value,
                        "path" => labels.path = value,
                        "owner" => labels.owner = value,
                        _ => {}
                    }
                }
                CostSample {
                    labels,
                    value: metric.get_counter().get_value(),
                }
            })
            .collect()
    }
}

impl Collector for CostCounters {
    fn desc(&self) -> Vec<&Desc> {
        self.counters.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.counters.collect()
    }
}

/// Registry holding the cost counters, rendered on every scrape
#[derive(Clone)]
pub struct CostRegistry {
    registry: Registry,
    counters: CostCounters,
}

impl CostRegistry {
    pub fn new() -> Result<Self, DomainError> {
        let registry = Registry::new();
        let counters = CostCounters::new()?;
        registry.register(Box::new(counters.clone()))?;
        Ok(Self { registry, counters })
    }

    pub fn counters(&self) -> &CostCounters {
        &self.counters
    }

    /// Render all registered metrics in the text exposition format
    pub fn render(&self) -> Result<String, DomainError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| DomainError::metrics(format!("metrics are not UTF-8: {}", e)))
    }
}
