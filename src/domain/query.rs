//! Fetch requests and the per-page requests derived from them.

use crate::domain::error::AnalyticsError;
use std::collections::{BTreeMap, BTreeSet};

/// Default rows per page; PostgREST deployments commonly cap at 1000.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Housekeeping columns the dashboard never shows.
pub const HOUSEKEEPING_COLUMNS: [&str; 2] = ["id", "created_at"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

/// Everything needed to read one table completely.
///
/// Filter values are compared as strings, which is how the row store's
/// request interface receives them anyway. The struct is `Hash + Eq` so it
/// doubles as a memoization key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchRequest {
    pub table_name: String,
    /// Empty means every column.
    pub select_columns: Vec<String>,
    pub page_size: usize,
    pub order_by: Option<OrderBy>,
    pub eq_filters: BTreeMap<String, String>,
    pub in_filters: BTreeMap<String, BTreeSet<String>>,
    pub drop_columns: Vec<String>,
}

impl FetchRequest {
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            select_columns: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            order_by: None,
            eq_filters: BTreeMap::new(),
            in_filters: BTreeMap::new(),
            drop_columns: HOUSEKEEPING_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn select<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.select_columns = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order_by = Some(OrderBy {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.eq_filters.insert(column.to_string(), value.to_string());
        self
    }

    pub fn is_in<S: AsRef<str>>(mut self, column: &str, values: &[S]) -> Self {
        self.in_filters.insert(
            column.to_string(),
            values.iter().map(|v| v.as_ref().to_string()).collect(),
        );
        self
    }

    pub fn drop_columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.drop_columns = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if self.table_name.trim().is_empty() {
            return Err(AnalyticsError::InvalidRequest {
                reason: "table name must not be empty".into(),
            });
        }
        if self.page_size == 0 {
            return Err(AnalyticsError::InvalidRequest {
                reason: format!("page size for {} must be positive", self.table_name),
            });
        }
        Ok(())
    }

    /// The page request covering rows `[start, start + page_size)`.
    pub fn page(&self, start: usize) -> PageRequest<'_> {
        self.page_range(start, self.page_size)
    }

    /// Like [`FetchRequest::page`] with an explicit size, which must be positive.
    pub fn page_range(&self, start: usize, size: usize) -> PageRequest<'_> {
        PageRequest {
            table_name: &self.table_name,
            select_columns: &self.select_columns,
            order_by: self.order_by.as_ref(),
            eq_filters: &self.eq_filters,
            in_filters: &self.in_filters,
            start,
            end: start + size - 1,
        }
    }
}

/// One range request sent to the row store. `start` and `end` are inclusive offsets.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub table_name: &'a str,
    pub select_columns: &'a [String],
    pub order_by: Option<&'a OrderBy>,
    pub eq_filters: &'a BTreeMap<String, String>,
    pub in_filters: &'a BTreeMap<String, BTreeSet<String>>,
    pub start: usize,
    pub end: usize,
}

impl PageRequest<'_> {
    pub fn requested_rows(&self) -> usize {
        self.end - self.start + 1
    }
}
