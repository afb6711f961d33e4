//! CSV directory row store and CSV export.
//!
//! Each table lives in `{dir}/{table}.csv`. Filters, ordering and paging are
//! applied in memory on every page request, which is fine for fixture-sized
//! mirrors.

use crate::domain::error::AnalyticsError;
use crate::domain::query::PageRequest;
use crate::domain::table::{Row, Table};
use crate::domain::value::Value;
use crate::ports::config_port::ConfigPort;
use crate::ports::row_store::{PagePayload, RowStore};
use std::cmp::Ordering;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct CsvAdapter {
    base_path: PathBuf,
    max_rows: Option<usize>,
}

/// Type a raw CSV cell: empty is null, then integer, float, bool, text.
pub fn parse_cell(raw: &str) -> Value {
    let s = raw.trim();
    if s.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        if f.is_finite() {
            return Value::Float(f);
        }
    }
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Text(raw.to_string()),
    }
}

/// Ordering for `ORDER BY`: dates as dates, numbers as numbers, else text.
fn compare_cells(a: &Value, b: &Value) -> Ordering {
    if let (Some(x), Some(y)) = (a.as_timestamp(), b.as_timestamp()) {
        return x.cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    a.key_string().cmp(&b.key_string())
}

/// Ascending order with nulls last, so the descending order puts them first.
fn compare_nulls_last(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare_cells(a, b),
    }
}

fn matches_filters(row: &Row, request: &PageRequest<'_>) -> bool {
    let eq_ok = request
        .eq_filters
        .iter()
        .all(|(col, v)| row.get(col).key_string().as_deref() == Some(v.as_str()));
    let in_ok = request.in_filters.iter().all(|(col, set)| {
        row.get(col)
            .key_string()
            .is_some_and(|k| set.contains(&k))
    });
    eq_ok && in_ok
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            max_rows: None,
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, AnalyticsError> {
        let dir = config
            .get_string("csv", "dir")
            .ok_or_else(|| AnalyticsError::ConfigMissing {
                section: "csv".into(),
                key: "dir".into(),
            })?;
        let adapter = Self::new(PathBuf::from(dir));
        let max_rows = config.get_int("csv", "max_rows", 0);
        Ok(if max_rows > 0 {
            adapter.with_max_rows(max_rows as usize)
        } else {
            adapter
        })
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    fn csv_path(&self, table: &str) -> Result<PathBuf, AnalyticsError> {
        let valid = !table.is_empty()
            && table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(AnalyticsError::InvalidRequest {
                reason: format!("invalid table name '{table}'"),
            });
        }
        Ok(self.base_path.join(format!("{table}.csv")))
    }

    /// Read a whole table file.
    pub fn read_table(&self, table: &str) -> Result<Table, AnalyticsError> {
        let path = self.csv_path(table)?;
        if !path.exists() {
            return Err(AnalyticsError::TableNotFound {
                table: table.to_string(),
            });
        }
        let content =
            fs::read_to_string(&path).map_err(|e| AnalyticsError::transient(table, e))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            rows.push(
                headers
                    .iter()
                    .zip(record.iter())
                    .map(|(h, cell)| (h.clone(), parse_cell(cell)))
                    .collect::<Row>(),
            );
        }
        Ok(Table::with_columns(headers, rows))
    }
}

impl RowStore for CsvAdapter {
    fn fetch_page(&self, request: &PageRequest<'_>) -> Result<PagePayload, AnalyticsError> {
        let table = self.read_table(request.table_name)?;
        let mut rows: Vec<Row> = table
            .into_rows()
            .into_iter()
            .filter(|r| matches_filters(r, request))
            .collect();

        if let Some(order) = request.order_by {
            let col = order.column.as_str();
            rows.sort_by(|a, b| {
                let ord = compare_nulls_last(a.get(col), b.get(col));
                if order.ascending { ord } else { ord.reverse() }
            });
        }

        let limit = match self.max_rows {
            Some(cap) => request.requested_rows().min(cap),
            None => request.requested_rows(),
        };
        debug!(table = request.table_name, start = request.start, limit, "csv page");

        let page = rows
            .into_iter()
            .skip(request.start)
            .take(limit)
            .map(|row| {
                if request.select_columns.is_empty() {
                    row
                } else {
                    request
                        .select_columns
                        .iter()
                        .map(|c| (c.clone(), row.get(c).clone()))
                        .collect()
                }
            })
            .collect();
        Ok(PagePayload::Rows(page))
    }
}

/// Write a table as CSV with a header row. Nulls become empty cells. A table
/// with no columns writes nothing.
pub fn write_table<W: Write>(table: &Table, writer: W) -> Result<(), AnalyticsError> {
    let mut wtr = csv::Writer::from_writer(writer);
    if table.columns().is_empty() {
        wtr.flush()?;
        return Ok(());
    }
    wtr.write_record(table.columns())?;
    for row in table.rows() {
        wtr.write_record(table.columns().iter().map(|c| row.get(c).to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_table_to_path(table: &Table, path: &Path) -> Result<(), AnalyticsError> {
    let file = fs::File::create(path)?;
    write_table(table, file)
}
