//! Counter reconciliation: turns cumulative report totals into monotonic
//! counter deltas

use std::collections::HashMap;

use rust_decimal::Decimal;

use super::record::{AggregatedElement, GroupingKey};

/// Last applied cumulative cost per grouping key.
///
/// Entries are created on first observation and never removed.
#[derive(Debug, Default, Clone)]
pub struct CounterState {
    last_values: HashMap<GroupingKey, Decimal>,
}

impl CounterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last applied cumulative value, zero for unseen keys
    pub fn last_value(&self, key: &GroupingKey) -> Decimal {
        self.last_values.get(key).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn len(&self) -> usize {
        self.last_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_values.is_empty()
    }
}

/// Increase to apply to the counter of one grouping key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterDelta {
    pub key: GroupingKey,
    pub delta: Decimal,
}

/// A cumulative value that went down since the last applied one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostRegression {
    pub key: GroupingKey,
    pub last_value: Decimal,
    pub observed: Decimal,
}

/// Result of one reconciliation pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub deltas: Vec<CounterDelta>,
    pub regressions: Vec<CostRegression>,
}

impl Reconciliation {
    /// Deltas that actually move a counter
    pub fn non_zero(&self) -> impl Iterator<Item = &CounterDelta> {
        self.deltas.iter().filter(|d| !d.delta.is_zero())
    }
}

/// Compute counter deltas for a reduced report and advance `state`.
///
/// A decreasing cumulative value is reported as a regression and skipped;
/// its state entry keeps the last applied value. Callers must hold the
/// state lock for the whole pass.
pub fn reconcile(aggregated: &[AggregatedElement], state: &mut CounterState) -> Reconciliation {
    let mut result = Reconciliation::default();

    for element in aggregated {
        let last_value = state.last_value(&element.key);
        let delta = element.cumulative_cost - last_value;

        if delta < Decimal::ZERO {
            tracing::warn!(
                key = %element.key,
                last_value = %last_value,
                observed = %element.cumulative_cost,
                "costs are falling, skipping counter update"
            );
            result.regressions.push(CostRegression {
                key: element.key.clone(),
                last_value,
                observed: element.cumulative_cost,
            });
            continue;
        }

        state
            .last_values
            .insert(element.key.clone(), element.cumulative_cost);
        result.deltas.push(CounterDelta {
            key: element.key.clone(),
            delta,
        });
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn element(account: &str, cost: Decimal) -> AggregatedElement {
        AggregatedElement {
            key: GroupingKey::new(account, "S3", "USD"),
            cumulative_cost: cost,
        }
    }

    #[test]
    fn test_first_observation_applies_full_value() {
        let mut state = CounterState::new();

        let result = reconcile(&[element("1", dec!(12.50))], &mut state);

        assert_eq!(result.deltas.len(), 1);
        assert_eq!(result.deltas[0].delta, dec!(12.50));
        assert_eq!(state.last_value(&GroupingKey::new("1", "S3", "USD")), dec!(12.50));
    }

    #[test]
    fn test_increase_applies_difference() {
        let mut state = CounterState::new();
        reconcile(&[element("1", dec!(10))], &mut state);

        let result = reconcile(&[element("1", dec!(15.5))], &mut state);

        assert_eq!(result.deltas[0].delta, dec!(5.5));
    }

    #[test]
    fn test_regression_is_skipped_and_state_kept() {
        let mut state = CounterState::new();
        reconcile(&[element("1", dec!(100))], &mut state);

        let result = reconcile(&[element("1", dec!(80))], &mut state);

        assert!(result.deltas.is_empty());
        assert_eq!(result.non_zero().count(), 0);
        assert_eq!(result.regressions.len(), 1);
        assert_eq!(result.regressions[0].last_value, dec!(100));
        assert_eq!(result.regressions[0].observed, dec!(80));
        assert_eq!(state.last_value(&GroupingKey::new("1", "S3", "USD")), dec!(100));

        // A later increase is measured against the last applied value
        let result = reconcile(&[element("1", dec!(110))], &mut state);
        assert_eq!(result.deltas[0].delta, dec!(10));
    }

    #[test]
    fn test_unchanged_value_yields_zero_delta() {
        let mut state = CounterState::new();
        reconcile(&[element("1", dec!(7))], &mut state);

        let result = reconcile(&[element("1", dec!(7))], &mut state);

        assert_eq!(result.deltas[0].delta, Decimal::ZERO);
        assert_eq!(result.non_zero().count(), 0);
        assert!(result.regressions.is_empty());
    }

    #[test]
    fn test_sum_of_deltas_matches_cumulative_growth() {
        let mut state = CounterState::new();
        let series = [dec!(1.1), dec!(1.1), dec!(2.35), dec!(9), dec!(9.01), dec!(42)];

        let applied: Decimal = series
            .iter()
            .map(|v| reconcile(&[element("1", *v)], &mut state))
            .flat_map(|r| r.deltas)
            .map(|d| d.delta)
            .sum();

        assert_eq!(applied, dec!(42));
    }

    #[test]
    fn test_keys_are_independent() {
        let mut state = CounterState::new();
        reconcile(&[element("1", dec!(5)), element("2", dec!(5))], &mut state);

        let result = reconcile(&[element("1", dec!(3)), element("2", dec!(8))], &mut state);

        assert_eq!(result.regressions.len(), 1);
        assert_eq!(result.deltas.len(), 1);
        assert_eq!(result.deltas[0].key.account_id, "2");
        assert_eq!(result.deltas[0].delta, dec!(3));
        assert_eq!(state.len(), 2);
    }
}
