//! AWS detailed billing CSV reports

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::domain::billing::BillingLineItem;
use crate::domain::DomainError;

const RECORD_TYPE: &str = "RecordType";
const LINKED_ACCOUNT_ID: &str = "LinkedAccountId";
const PRODUCT_CODE: &str = "ProductCode";
const TOTAL_COST: &str = "TotalCost";
const CURRENCY_CODE: &str = "CurrencyCode";

/// Only rows of this record type carry per-account costs
pub const LINKED_LINE_ITEM: &str = "LinkedLineItem";

/// Column positions taken from the header row
struct Columns {
    record_type: usize,
    account_id: usize,
    product_code: usize,
    total_cost: usize,
    currency: usize,
}

impl Columns {
    fn from_header(header: &csv::StringRecord) -> Result<Self, DomainError> {
        let positions: HashMap<&str, usize> =
            header.iter().enumerate().map(|(i, name)| (name, i)).collect();

        let column = |name: &str| {
            positions
                .get(name)
                .copied()
                .ok_or_else(|| DomainError::parse(format!("CSV report has no '{}' column", name)))
        };

        Ok(Self {
            record_type: column(RECORD_TYPE)?,
            account_id: column(LINKED_ACCOUNT_ID)?,
            product_code: column(PRODUCT_CODE)?,
            total_cost: column(TOTAL_COST)?,
            currency: column(CURRENCY_CODE)?,
        })
    }
}

/// Parse a CSV billing report into linked line items.
///
/// Fails only when the header lacks a required column. Rows that are not
/// `LinkedLineItem`s are ignored; malformed rows are logged and skipped.
pub fn parse_csv_report(input: &[u8]) -> Result<Vec<BillingLineItem>, DomainError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let header = reader
        .headers()
        .map_err(|e| DomainError::parse(format!("Failed to read CSV header: {}", e)))?
        .clone();
    let columns = Columns::from_header(&header)?;

    let mut items = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(line = line + 2, error = %e, "skipping unreadable CSV row");
                continue;
            }
        };

        if record.get(columns.record_type) != Some(LINKED_LINE_ITEM) {
            continue;
        }

        match line_item(&record, &columns) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!(line = line + 2, error = %e, "skipping malformed CSV row"),
        }
    }

    Ok(items)
}

fn line_item(record: &csv::StringRecord, columns: &Columns) -> Result<BillingLineItem, DomainError> {
    let field = |i: usize| {
        record
            .get(i)
            .ok_or_else(|| DomainError::parse(format!("row has no field {}", i)))
    };

    let raw_cost = field(columns.total_cost)?;
    let cost = Decimal::from_str(raw_cost.trim())
        .or_else(|_| Decimal::from_scientific(raw_cost.trim()))
        .map_err(|e| DomainError::parse(format!("couldn't parse cost '{}': {}", raw_cost, e)))?;

    Ok(BillingLineItem::new(
        field(columns.account_id)?,
        field(columns.product_code)?,
        cost,
        field(columns.currency)?,
    ))
}
