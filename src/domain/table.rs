//! Rows and tables as returned by the row store.

use crate::domain::error::AnalyticsError;
use crate::domain::value::Value;
use std::collections::{BTreeSet, HashSet};

/// One record: column name to value, in the order the columns arrived.
/// A column absent from the record reads as null.
#[derive(Debug, Clone, Default)]
pub struct Row {
    values: Vec<(String, Value)>,
}

static NULL: Value = Value::Null;

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set(column, value.into());
        self
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.values.iter().position(|(k, _)| k == column)
    }

    pub fn get(&self, column: &str) -> &Value {
        self.position(column).map_or(&NULL, |i| &self.values[i].1)
    }

    /// Overwrite in place, or append a new column at the end.
    pub fn set(&mut self, column: &str, value: Value) {
        match self.position(column) {
            Some(i) => self.values[i].1 = value,
            None => self.values.push((column.to_string(), value)),
        }
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.position(column).map(|i| self.values.remove(i).1)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.position(column).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Rows compare as maps: column order does not matter.
impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self.values.iter().all(|(k, v)| other.get(k) == v && other.contains(k))
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.set(&k, v);
        }
        row
    }
}

/// An ordered sequence of rows sharing one schema.
///
/// `columns` records every column seen, in first-seen order. Transformations
/// never mutate a table in place; they return a new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table whose schema is the union of the rows' columns, in the
    /// order they are first seen. For a uniform table that is the column order
    /// of the first row, as the store delivered it.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut columns = Vec::new();
        let mut seen = HashSet::new();
        for row in &rows {
            for col in row.columns() {
                if seen.insert(col.to_string()) {
                    columns.push(col.to_string());
                }
            }
        }
        Self { columns, rows }
    }

    pub fn with_columns(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let mut table = Self::from_rows(rows);
        let extra: Vec<String> = table
            .columns
            .iter()
            .filter(|c| !columns.contains(c))
            .cloned()
            .collect();
        table.columns = columns;
        table.columns.extend(extra);
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Fail with a schema error naming the first absent column.
    pub fn require_columns(&self, required: &[&str]) -> Result<(), AnalyticsError> {
        match required.iter().find(|c| !self.has_column(c)) {
            Some(missing) => Err(AnalyticsError::schema(*missing)),
            None => Ok(()),
        }
    }

    pub fn column_values(&self, column: &str) -> impl Iterator<Item = &Value> {
        self.rows.iter().map(move |r| r.get(column))
    }

    /// Drop the named columns. Columns that are not present are ignored.
    pub fn drop_columns<S: AsRef<str>>(&self, drop: &[S]) -> Table {
        let drop: HashSet<&str> = drop.iter().map(AsRef::as_ref).collect();
        let columns = self
            .columns
            .iter()
            .filter(|c| !drop.contains(c.as_str()))
            .cloned()
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .filter(|(k, _)| !drop.contains(k))
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect()
            })
            .collect();
        Table { columns, rows }
    }

    /// Return a new table with `column` set on every row by `f`.
    pub fn map_column<F>(&self, column: &str, f: F) -> Table
    where
        F: Fn(&Row) -> Value,
    {
        let mut columns = self.columns.clone();
        if !columns.iter().any(|c| c == column) {
            columns.push(column.to_string());
        }
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut out = row.clone();
                out.set(column, f(row));
                out
            })
            .collect();
        Table { columns, rows }
    }

    /// Keep rows for which `keep` returns true.
    pub fn filter<F>(&self, keep: F) -> Table
    where
        F: Fn(&Row) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Distinct non-null values of a column as sorted strings.
    pub fn unique_values(&self, column: &str) -> Vec<String> {
        self.column_values(column)
            .filter_map(Value::key_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
