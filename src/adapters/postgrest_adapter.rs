//! PostgREST (Supabase) row store over blocking HTTP.
//!
//! Pages are requested with `Range-Unit: items` and an inclusive `Range`
//! header. The server may cap a page below the requested size without saying
//! so; the fetcher deals with that.

use crate::domain::error::AnalyticsError;
use crate::domain::query::PageRequest;
use crate::domain::table::Row;
use crate::domain::value::Value;
use crate::ports::config_port::ConfigPort;
use crate::ports::row_store::{PagePayload, RowStore};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::debug;

pub const ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";
const DEFAULT_TIMEOUT_SECS: i64 = 30;

/// Error code PostgREST uses for a relation missing from its schema cache.
const TABLE_MISSING_CODE: &str = "PGRST205";

pub struct PostgrestAdapter {
    client: Client,
    base_url: String,
    anon_key: Option<String>,
}

impl PostgrestAdapter {
    pub fn new(
        base_url: &str,
        anon_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AnalyticsError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalyticsError::Database {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
        })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, AnalyticsError> {
        let url = config
            .get_string("postgrest", "url")
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| AnalyticsError::ConfigMissing {
                section: "postgrest".into(),
                key: "url".into(),
            })?;
        let anon_key = config
            .get_string("postgrest", "anon_key")
            .or_else(|| std::env::var(ANON_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty());
        let timeout = config
            .get_int("postgrest", "timeout_secs", DEFAULT_TIMEOUT_SECS)
            .max(1) as u64;
        Self::new(&url, anon_key, Duration::from_secs(timeout))
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }
}

/// Quote a filter value for use inside `in.(...)`.
fn quote_list_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Query string pairs for one page: projection, filters and ordering.
pub fn query_params(request: &PageRequest<'_>) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let select = if request.select_columns.is_empty() {
        "*".to_string()
    } else {
        request.select_columns.join(",")
    };
    params.push(("select".to_string(), select));
    for (col, value) in request.eq_filters {
        params.push((col.clone(), format!("eq.{value}")));
    }
    for (col, values) in request.in_filters {
        let list: Vec<String> = values.iter().map(|v| quote_list_value(v)).collect();
        params.push((col.clone(), format!("in.({})", list.join(","))));
    }
    if let Some(order) = request.order_by {
        let dir = if order.ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{}.{dir}", order.column)));
    }
    params
}

/// Decode a successful response body. Anything but an array of objects is malformed.
pub fn decode_body(body: &str) -> PagePayload {
    let parsed: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return PagePayload::Malformed(body.to_string()),
    };
    let serde_json::Value::Array(items) = parsed else {
        return PagePayload::Malformed(body.to_string());
    };

    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let serde_json::Value::Object(fields) = item else {
            return PagePayload::Malformed(body.to_string());
        };
        rows.push(
            fields
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect::<Row>(),
        );
    }
    PagePayload::Rows(rows)
}

/// Map a non-success response to an error.
pub fn classify_failure(table: &str, status: StatusCode, body: &str) -> AnalyticsError {
    if status == StatusCode::NOT_FOUND
        || body.contains(TABLE_MISSING_CODE)
        || body.contains("Could not find the table")
    {
        return AnalyticsError::TableNotFound {
            table: table.to_string(),
        };
    }
    AnalyticsError::transient(table, format!("HTTP {status}: {body}"))
}

impl RowStore for PostgrestAdapter {
    fn fetch_page(&self, request: &PageRequest<'_>) -> Result<PagePayload, AnalyticsError> {
        let table = request.table_name;
        debug!(table, start = request.start, end = request.end, "postgrest page");

        let mut call = self
            .client
            .get(self.table_url(table))
            .query(&query_params(request))
            .header("Accept", "application/json")
            .header("Range-Unit", "items")
            .header("Range", format!("{}-{}", request.start, request.end));
        if let Some(key) = &self.anon_key {
            call = call
                .header("apikey", key)
                .header("Authorization", format!("Bearer {key}"));
        }

        let response = call
            .send()
            .map_err(|e| AnalyticsError::transient(table, e))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| AnalyticsError::transient(table, e))?;

        // Offset past the end of the table.
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            return Ok(PagePayload::Rows(Vec::new()));
        }
        if !status.is_success() {
            return Err(classify_failure(table, status, &body));
        }
        Ok(decode_body(&body))
    }
}
