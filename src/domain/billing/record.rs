//! Billing line items and their grouping key

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One raw cost record from a provider's billing export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingLineItem {
    pub account_id: String,
    pub service_name: String,
    pub cost: Decimal,
    pub currency: String,
}

impl BillingLineItem {
    pub fn new(
        account_id: impl Into<String>,
        service_name: impl Into<String>,
        cost: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            service_name: service_name.into(),
            cost,
            currency: currency.into(),
        }
    }

    pub fn key(&self) -> GroupingKey {
        GroupingKey::new(&self.account_id, &self.service_name, &self.currency)
    }
}

/// Aggregation key: (account ID, service name, currency)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupingKey {
    pub account_id: String,
    pub service_name: String,
    pub currency: String,
}

impl GroupingKey {
    pub fn new(
        account_id: impl Into<String>,
        service_name: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            service_name: service_name.into(),
            currency: currency.into(),
        }
    }
}

impl fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.account_id, self.service_name, self.currency)
    }
}

/// Summed cost of all line items sharing one grouping key in a report snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedElement {
    pub key: GroupingKey,
    pub cumulative_cost: Decimal,
}

impl AggregatedElement {
    pub fn account_id(&self) -> &str {
        &self.key.account_id
    }

    pub fn service_name(&self) -> &str {
        &self.key.service_name
    }

    pub fn currency(&self) -> &str {
        &self.key.currency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_line_item_key() {
        let item = BillingLineItem::new("1234", "AmazonS3", dec!(1.5), "USD");
        assert_eq!(item.key(), GroupingKey::new("1234", "AmazonS3", "USD"));
    }

    #[test]
    fn test_grouping_key_display() {
        let key = GroupingKey::new("my-project", "compute", "EUR");
        assert_eq!(key.to_string(), "my-project-compute-EUR");
    }
}
