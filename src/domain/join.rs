//! Left joins between fetched tables.
//!
//! Used to line the market value series up with match results
//! (`date = match_date`) and stats snapshots (`date = as_of_date`).
//! Keys are compared by their string form; dates are compared as parsed
//! timestamps so `2024-01-03` matches `2024-01-03T00:00:00`.

use crate::domain::error::AnalyticsError;
use crate::domain::table::{Row, Table};
use crate::domain::value::Value;
use std::collections::HashMap;

/// Suffix given to right-hand columns whose name clashes with the left table.
pub const RIGHT_SUFFIX: &str = "_right";

fn join_key(value: &Value) -> Option<String> {
    match value.as_timestamp() {
        Some(ts) => Some(ts.format("%Y-%m-%dT%H:%M:%S").to_string()),
        None => value.key_string(),
    }
}

fn row_key(row: &Row, cols: &[&str]) -> Option<Vec<String>> {
    cols.iter().map(|c| join_key(row.get(c))).collect()
}

/// Left join `right` onto `left` on pairs of `(left_column, right_column)`.
///
/// Every left row is kept, in order. A left row matching several right rows is
/// repeated once per match. Right key columns are not copied. Rows with a null
/// key never match.
pub fn left_join(
    left: &Table,
    right: &Table,
    on: &[(&str, &str)],
) -> Result<Table, AnalyticsError> {
    let left_keys: Vec<&str> = on.iter().map(|(l, _)| *l).collect();
    let right_keys: Vec<&str> = on.iter().map(|(_, r)| *r).collect();
    if !left.is_empty() {
        left.require_columns(&left_keys)?;
    }
    if !right.is_empty() {
        right.require_columns(&right_keys)?;
    }

    let carried: Vec<(String, String)> = right
        .columns()
        .iter()
        .filter(|c| !right_keys.contains(&c.as_str()))
        .map(|c| {
            let out = if left.has_column(c) {
                format!("{c}{RIGHT_SUFFIX}")
            } else {
                c.clone()
            };
            (c.clone(), out)
        })
        .collect();

    let mut index: HashMap<Vec<String>, Vec<&Row>> = HashMap::new();
    for row in right.rows() {
        if let Some(key) = row_key(row, &right_keys) {
            index.entry(key).or_default().push(row);
        }
    }

    let mut rows = Vec::with_capacity(left.len());
    for row in left.rows() {
        let matches = row_key(row, &left_keys).and_then(|k| index.get(&k));
        match matches {
            Some(found) => {
                for other in found {
                    let mut out = row.clone();
                    for (src, dst) in &carried {
                        out.set(dst, other.get(src).clone());
                    }
                    rows.push(out);
                }
            }
            None => {
                let mut out = row.clone();
                for (_, dst) in &carried {
                    out.set(dst, Value::Null);
                }
                rows.push(out);
            }
        }
    }

    let mut columns = left.columns().to_vec();
    columns.extend(carried.into_iter().map(|(_, dst)| dst));
    Ok(Table::with_columns(columns, rows))
}
