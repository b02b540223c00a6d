//! Billing reports: formats, period layout and fetching

mod csv_report;
mod fetcher;
mod json_report;
mod period;
mod window;

pub use csv_report::{parse_csv_report, LINKED_LINE_ITEM};
pub use fetcher::{FetchOutcome, LatestObjectFetcher, ReportParser, RollingWindowFetcher};
pub use json_report::parse_json_report;
pub use period::{monthly_prefixes, report_slot, REPORTS_PER_MONTH};
pub use window::{CachedReport, ReportWindow};
