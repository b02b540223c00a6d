//! Billing domain: line items, reduction and counter reconciliation

mod reconciler;
mod record;
mod reducer;

pub use reconciler::{reconcile, CostRegression, CounterDelta, CounterState, Reconciliation};
pub use record::{AggregatedElement, BillingLineItem, GroupingKey};
pub use reducer::{as_line_items, derive_service_name, reduce, MISC_SERVICE};
