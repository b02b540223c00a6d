//! GCP billing export queried from BigQuery

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::gcs::GCP_PROVIDER;
use crate::domain::billing::MISC_SERVICE;
use crate::domain::report::FetchOutcome;
use crate::domain::{BillingLineItem, Clock, DomainError, ReportSource};
use crate::infrastructure::gcp::{bearer, TokenSource};

pub const BIGQUERY_BASE_URL: &str = "https://bigquery.googleapis.com";

/// Account id used for costs not attributed to any project
pub const NO_PROJECT: &str = "none";

const QUERY_TIMEOUT_MS: u64 = 60_000;

static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-]+(\.[A-Za-z0-9_\-]+){1,2}$").expect("static regex is valid"));

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    timeout_ms: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    rows: Vec<Row>,
    page_token: Option<String>,
    job_reference: Option<JobReference>,
}

#[derive(Deserialize)]
struct Row {
    f: Vec<Cell>,
}

#[derive(Deserialize)]
struct Cell {
    v: serde_json::Value,
}

impl Row {
    fn text(&self, index: usize) -> Option<&str> {
        self.f.get(index).and_then(|cell| cell.v.as_str())
    }

    /// Columns: project id, currency, service, cost
    fn into_line_item(self) -> Result<BillingLineItem, DomainError> {
        let raw_cost = self
            .text(3)
            .ok_or_else(|| DomainError::parse("row has no cost"))?;
        let cost = Decimal::from_str(raw_cost)
            .or_else(|_| Decimal::from_scientific(raw_cost))
            .map_err(|e| DomainError::parse(format!("couldn't parse cost '{}': {}", raw_cost, e)))?;

        Ok(BillingLineItem::new(
            self.text(0).unwrap_or(NO_PROJECT),
            self.text(2).unwrap_or(MISC_SERVICE),
            cost,
            self.text(1).unwrap_or_default(),
        ))
    }
}

/// Monthly totals per project, service and currency
pub fn monthly_cost_query(table: &str, invoice_month: &str) -> String {
    format!(
        "SELECT project.id AS project_id, currency, service.description AS service, \
         CAST(SUM(cost) AS STRING) AS cost \
         FROM `{}` \
         WHERE invoice.month = '{}' \
         GROUP BY project_id, currency, service",
        table, invoice_month
    )
}

/// Billing export table queried through the BigQuery REST API
pub struct BigQueryReportSource {
    http_client: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
    clock: Arc<dyn Clock>,
    base_url: String,
    project: String,
    table: String,
}

impl BigQueryReportSource {
    /// `table` is `project.dataset.table` or `dataset.table`; queries are
    /// billed to `project`
    pub fn new(
        http_client: reqwest::Client,
        tokens: Arc<dyn TokenSource>,
        clock: Arc<dyn Clock>,
        project: impl Into<String>,
        table: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let table = table.into();
        if !TABLE_NAME.is_match(&table) {
            return Err(DomainError::configuration(format!(
                "invalid BigQuery table name '{}'",
                table
            )));
        }

        Ok(Self {
            http_client,
            tokens,
            clock,
            base_url: BIGQUERY_BASE_URL.to_string(),
            project: project.into(),
            table,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn queries_url(&self) -> String {
        format!(
            "{}/bigquery/v2/projects/{}/queries",
            self.base_url.trim_end_matches('/'),
            self.project
        )
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<QueryResponse, DomainError> {
        let response = request
            .header(reqwest::header::AUTHORIZATION, bearer(self.tokens.as_ref()).await?)
            .send()
            .await
            .map_err(|e| DomainError::object_store(format!("BigQuery request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(DomainError::object_store(format!(
                "BigQuery returned error status: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| DomainError::parse(format!("Failed to parse BigQuery response: {}", e)))
    }

    async fn run_query(&self, query: &str) -> Result<Vec<Row>, DomainError> {
        let request = QueryRequest {
            query,
            use_legacy_sql: false,
            timeout_ms: QUERY_TIMEOUT_MS,
        };
        let mut page = self
            .send(self.http_client.post(self.queries_url()).json(&request))
            .await?;

        if !page.job_complete {
            return Err(DomainError::object_store(
                "BigQuery job did not complete within the timeout",
            ));
        }

        let mut rows = std::mem::take(&mut page.rows);
        while let (Some(token), Some(job)) = (page.page_token.take(), page.job_reference.as_ref()) {
            let mut query = vec![("pageToken", token)];
            if let Some(location) = &job.location {
                query.push(("location", location.clone()));
            }
            let url = format!("{}/{}", self.queries_url(), job.job_id);
            let next = self.send(self.http_client.get(url).query(&query)).await?;

            rows.extend(next.rows);
            page.page_token = next.page_token;
        }

        Ok(rows)
    }
}

#[async_trait]
impl ReportSource for BigQueryReportSource {
    fn provider(&self) -> &'static str {
        GCP_PROVIDER
    }

    /// Re-runs the query every time; unchanged totals reconcile to zero deltas
    async fn fetch(&self) -> Result<FetchOutcome<Vec<BillingLineItem>>, DomainError> {
        let invoice_month = self.clock.now().format("%Y%m").to_string();
        let query = monthly_cost_query(&self.table, &invoice_month);
        tracing::debug!(table = %self.table, invoice_month = %invoice_month, "querying billing export");

        let rows = self.run_query(&query).await?;
        if rows.is_empty() {
            return Ok(FetchOutcome::Empty);
        }

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_line_item() {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!(error = %e, "skipping malformed BigQuery row"),
            }
        }

        Ok(FetchOutcome::Fresh(items))
    }

    fn describe(&self) -> String {
        format!("GCP BigQuery billing export '{}'", self.table)
    }
}
