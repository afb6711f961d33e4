//! Derived metrics on the latest-snapshot player stats table.

use crate::domain::error::AnalyticsError;
use crate::domain::table::Table;
use crate::domain::value::Value;

pub const POINTS_PER_VALUE: &str = "points_per_value";
pub const RATIO_PURCHASE_SALES: &str = "ratio_purchase_sales";

/// Scale applied to points/value so the ratio reads as points per 100k.
const POINTS_PER_VALUE_SCALE: f64 = 100_000.0;

/// Source columns for the ratio pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatioColumns {
    pub points: String,
    pub value: String,
    pub purchases_pct: String,
    pub sales_pct: String,
}

impl Default for RatioColumns {
    fn default() -> Self {
        Self {
            points: "points".into(),
            value: "value".into(),
            purchases_pct: "market_purchases_pct".into(),
            sales_pct: "market_sales_pct".into(),
        }
    }
}

/// Round to two decimals, half away from zero.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// `max(0, numerator / denominator)`, null when either side is missing or the
/// denominator is zero.
pub fn floored_ratio(numerator: &Value, denominator: &Value) -> Option<f64> {
    let num = numerator.as_f64()?;
    let den = denominator.as_f64()?;
    if den == 0.0 {
        return None;
    }
    Some((num / den).max(0.0))
}

/// Add `points_per_value` and `ratio_purchase_sales` to a stats snapshot.
///
/// An empty table is returned unchanged.
pub fn derive_ratios(table: &Table, cols: &RatioColumns) -> Result<Table, AnalyticsError> {
    if table.is_empty() {
        return Ok(table.clone());
    }
    table.require_columns(&[
        cols.points.as_str(),
        cols.value.as_str(),
        cols.purchases_pct.as_str(),
        cols.sales_pct.as_str(),
    ])?;

    let with_ppv = table.map_column(POINTS_PER_VALUE, |row| {
        Value::from_f64(
            floored_ratio(row.get(&cols.points), row.get(&cols.value))
                .map(|r| round2(r * POINTS_PER_VALUE_SCALE)),
        )
    });
    Ok(with_ppv.map_column(RATIO_PURCHASE_SALES, |row| {
        Value::from_f64(
            floored_ratio(row.get(&cols.purchases_pct), row.get(&cols.sales_pct)).map(round2),
        )
    }))
}

/// Legend labels for positions, numbered in pitch order.
pub const POSITION_LABELS: [(&str, &str); 4] = [
    ("Goalkeeper", "1 - Portero"),
    ("Defender", "2 - Defensa"),
    ("Midfielder", "3 - Centrocampista"),
    ("Forward", "4 - Delantero"),
];

pub fn position_label(raw: &str) -> Option<&'static str> {
    POSITION_LABELS
        .iter()
        .find(|(k, _)| *k == raw)
        .map(|(_, label)| *label)
}

/// Replace raw position names with their labels. Unknown positions become null.
pub fn label_positions(table: &Table, column: &str) -> Table {
    if !table.has_column(column) {
        return table.clone();
    }
    table.map_column(column, |row| {
        row.get(column)
            .as_str()
            .and_then(position_label)
            .map_or(Value::Null, Value::from)
    })
}
