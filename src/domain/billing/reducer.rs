//! Report reducer: groups line items by (account, service, currency)

use std::collections::HashMap;

use super::record::{AggregatedElement, BillingLineItem, GroupingKey};

/// Service label used when no unambiguous service can be derived
pub const MISC_SERVICE: &str = "misc";

/// Group line items by their grouping key and sum the costs.
///
/// Output is in first-seen key order.
pub fn reduce<'a, I>(items: I) -> Vec<AggregatedElement>
where
    I: IntoIterator<Item = &'a BillingLineItem>,
{
    let mut index: HashMap<GroupingKey, usize> = HashMap::new();
    let mut out: Vec<AggregatedElement> = Vec::new();

    for item in items {
        let key = item.key();
        match index.get(&key) {
            Some(&i) => out[i].cumulative_cost += item.cost,
            None => {
                index.insert(key.clone(), out.len());
                out.push(AggregatedElement {
                    key,
                    cumulative_cost: item.cost,
                });
            }
        }
    }

    out
}

/// Flatten already-aggregated elements back into line items so that several
/// report snapshots can be reduced together
pub fn as_line_items(elements: &[AggregatedElement]) -> Vec<BillingLineItem> {
    elements
        .iter()
        .map(|e| BillingLineItem {
            account_id: e.key.account_id.clone(),
            service_name: e.key.service_name.clone(),
            cost: e.cumulative_cost,
            currency: e.key.currency.clone(),
        })
        .collect()
}

/// Pick the service label for a record.
///
/// A direct service identifier wins. Otherwise a single measurement id of the
/// form `com.google.cloud/services/<service>/...` yields `<service>`; any
/// other single measurement id is used verbatim. Zero or several
/// measurements are ambiguous and map to `misc`.
pub fn derive_service_name(direct: Option<&str>, measurement_ids: &[&str]) -> String {
    if let Some(name) = direct.filter(|n| !n.is_empty()) {
        return name.to_string();
    }

    let [measurement] = measurement_ids else {
        return MISC_SERVICE.to_string();
    };

    let parts: Vec<&str> = measurement.split('/').collect();
    if parts.len() >= 3 && parts[1] == "services" {
        return parts[2].to_string();
    }

    if measurement.is_empty() {
        MISC_SERVICE.to_string()
    } else {
        measurement.to_string()
    }
}
