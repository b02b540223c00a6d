//! GCP billing export JSON reports

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::billing::{derive_service_name, BillingLineItem};
use crate::domain::DomainError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Measurement {
    #[serde(default)]
    measurement_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Cost {
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    value: Option<f64>,
}

/// One element of the exported JSON array
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BillingElement {
    project_id: String,
    #[serde(default)]
    service_name: Option<String>,
    #[serde(default)]
    measurements: Vec<Measurement>,
    #[serde(default)]
    cost: Cost,
}

impl BillingElement {
    fn service_name(&self) -> String {
        let measurements: Vec<&str> = self
            .measurements
            .iter()
            .map(|m| m.measurement_id.as_str())
            .collect();
        derive_service_name(self.service_name.as_deref(), &measurements)
    }

    /// `cost.amount` when it parses, otherwise the numeric `cost.value`
    fn cost(&self) -> Decimal {
        if let Some(amount) = self.cost.amount.as_deref().filter(|a| !a.is_empty()) {
            match Decimal::from_str(amount).or_else(|_| Decimal::from_scientific(amount)) {
                Ok(value) => return value,
                Err(e) => tracing::warn!(
                    project_id = %self.project_id,
                    amount,
                    error = %e,
                    "failed to convert cost amount"
                ),
            }
        }

        self.cost
            .value
            .and_then(|v| Decimal::try_from(v).ok())
            .unwrap_or(Decimal::ZERO)
    }

    fn into_line_item(self) -> BillingLineItem {
        let service_name = self.service_name();
        let cost = self.cost();
        BillingLineItem::new(self.project_id, service_name, cost, self.cost.currency)
    }
}

/// Parse a JSON billing export into line items.
///
/// The document must be a JSON array; elements that do not have the
/// expected shape are logged and skipped.
pub fn parse_json_report(input: &[u8]) -> Result<Vec<BillingLineItem>, DomainError> {
    let raw: Vec<serde_json::Value> = serde_json::from_slice(input)
        .map_err(|e| DomainError::parse(format!("Failed to parse report JSON: {}", e)))?;

    let mut items = Vec::with_capacity(raw.len());
    for (index, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<BillingElement>(value) {
            Ok(element) => items.push(element.into_line_item()),
            Err(e) => tracing::warn!(index, error = %e, "skipping malformed billing element"),
        }
    }

    Ok(items)
}
