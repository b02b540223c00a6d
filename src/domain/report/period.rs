//! Billing period prefixes and report slots

use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Number of per-day report slots kept for one billing month
pub const REPORTS_PER_MONTH: usize = 32;

static DAY_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-(\d{2})\.json$").expect("static regex is valid"));

/// Object key prefixes for the current and the previous calendar month, in
/// that order: `{prefix}-YYYY-MM-`
pub fn monthly_prefixes(report_prefix: &str, now: DateTime<Utc>) -> [String; 2] {
    let (year, month) = (now.year(), now.month());
    let (last_year, last_month) = if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    };

    [
        format!("{}-{:04}-{:02}-", report_prefix, year, month),
        format!("{}-{:04}-{:02}-", report_prefix, last_year, last_month),
    ]
}

/// Window slot of a daily report, derived from the day in its name
/// (`...-YYYY-MM-DD.json` maps day `DD` to slot `DD - 1`)
pub fn report_slot(key: &str) -> Option<usize> {
    let day: usize = DAY_SUFFIX.captures(key)?.get(1)?.as_str().parse().ok()?;
    if (1..=REPORTS_PER_MONTH).contains(&day) {
        Some(day - 1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(date: &str) -> DateTime<Utc> {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_monthly_prefixes() {
        let cases = [
            ("2017-01-02", ["prefix-2017-01-", "prefix-2016-12-"]),
            ("2016-12-02", ["prefix-2016-12-", "prefix-2016-11-"]),
            ("2016-07-02", ["prefix-2016-07-", "prefix-2016-06-"]),
            ("2017-05-03", ["prefix-2017-05-", "prefix-2017-04-"]),
        ];

        for (date, expected) in cases {
            let prefixes = monthly_prefixes("prefix", at(date));
            assert_eq!(prefixes, expected.map(String::from), "date {}", date);
        }
    }

    #[test]
    fn test_report_slot() {
        assert_eq!(report_slot("my-billing-2017-01-01.json"), Some(0));
        assert_eq!(report_slot("my-billing-2017-01-31.json"), Some(30));
        assert_eq!(report_slot("reports/my-billing-2017-01-15.json"), Some(14));
    }

    #[test]
    fn test_report_slot_rejects_invalid_names() {
        assert_eq!(report_slot("my-billing-2017-01-00.json"), None);
        assert_eq!(report_slot("my-billing-2017-01-33.json"), None);
        assert_eq!(report_slot("my-billing-2017-01-xx.json"), None);
        assert_eq!(report_slot("a.json"), None);
        assert_eq!(report_slot("my-billing-2017-01-01.csv"), None);
    }
}
