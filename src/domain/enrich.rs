//! Per-entity time-series features on market value history.
//!
//! For each entity (player) the rows are ordered by date and three families of
//! columns are derived from the value column:
//!
//! - `value_change_{p}`: `v[i] - v[i-p]`
//! - `value_change_{p}_pct`: `100 * (v[i] / v[i-p] - 1)`, null when `v[i-p]` is 0
//! - `value_avg_{w}`: mean of the non-null values in rows `i-w+1..=i`; the
//!   window shrinks at the start of the series
//!
//! Lags count rows, not calendar days. Every feature only looks at rows at or
//! before the current one. Rows whose date cannot be parsed keep their place
//! in the output (after the dated rows of their entity) with null features.

use crate::domain::error::AnalyticsError;
use crate::domain::table::{Row, Table};
use crate::domain::value::Value;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::debug;

pub const DEFAULT_LAG_PERIODS: [usize; 3] = [1, 7, 30];
pub const DEFAULT_ROLLING_WINDOWS: [usize; 3] = [7, 14, 30];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichConfig {
    pub entity_column: String,
    pub date_column: String,
    pub value_column: String,
    pub lag_periods: Vec<usize>,
    pub rolling_windows: Vec<usize>,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            entity_column: "player_name".into(),
            date_column: "date".into(),
            value_column: "market_value_eur".into(),
            lag_periods: DEFAULT_LAG_PERIODS.to_vec(),
            rolling_windows: DEFAULT_ROLLING_WINDOWS.to_vec(),
        }
    }
}

impl EnrichConfig {
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if self.lag_periods.contains(&0) {
            return Err(AnalyticsError::InvalidRequest {
                reason: "lag periods must be at least 1".into(),
            });
        }
        if self.rolling_windows.contains(&0) {
            return Err(AnalyticsError::InvalidRequest {
                reason: "rolling windows must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Names of the derived columns, in output order.
    pub fn derived_columns(&self) -> Vec<String> {
        let mut cols = Vec::new();
        for p in &self.lag_periods {
            cols.push(change_column(*p));
            cols.push(change_pct_column(*p));
        }
        for w in &self.rolling_windows {
            cols.push(avg_column(*w));
        }
        cols
    }
}

pub fn change_column(period: usize) -> String {
    format!("value_change_{period}")
}

pub fn change_pct_column(period: usize) -> String {
    format!("value_change_{period}_pct")
}

pub fn avg_column(window: usize) -> String {
    format!("value_avg_{window}")
}

struct Observation<'a> {
    row: &'a Row,
    date: Option<NaiveDateTime>,
    value: Option<f64>,
}

/// Named entities sort by name; rows without an entity key go last.
type GroupKey = (bool, String);

pub fn enrich(table: &Table, config: &EnrichConfig) -> Result<Table, AnalyticsError> {
    if table.is_empty() {
        return Ok(table.clone());
    }
    config.validate()?;
    table.require_columns(&[
        config.entity_column.as_str(),
        config.date_column.as_str(),
        config.value_column.as_str(),
    ])?;

    let mut groups: BTreeMap<GroupKey, Vec<Observation<'_>>> = BTreeMap::new();
    for row in table.rows() {
        let key = match row.get(&config.entity_column).key_string() {
            Some(name) => (false, name),
            None => (true, String::new()),
        };
        groups.entry(key).or_default().push(Observation {
            row,
            date: row.get(&config.date_column).as_timestamp(),
            value: row.get(&config.value_column).as_f64(),
        });
    }
    debug!(groups = groups.len(), rows = table.len(), "enriching series");

    let mut out = Vec::with_capacity(table.len());
    for (_, group) in groups {
        let (mut dated, undated): (Vec<_>, Vec<_>) =
            group.into_iter().partition(|o| o.date.is_some());
        dated.sort_by_key(|o| o.date);

        let values: Vec<Option<f64>> = dated.iter().map(|o| o.value).collect();
        let mut enriched: Vec<(Option<NaiveDateTime>, Row)> = dated
            .iter()
            .enumerate()
            .map(|(i, obs)| (obs.date, derive_row(obs, i, &values, config)))
            .collect();
        enriched.sort_by(|a, b| b.0.cmp(&a.0));
        out.extend(enriched.into_iter().map(|(_, row)| row));

        out.extend(undated.iter().map(|obs| null_row(obs, config)));
    }

    let mut columns = table.columns().to_vec();
    for col in config.derived_columns() {
        if !columns.contains(&col) {
            columns.push(col);
        }
    }
    Ok(Table::with_columns(columns, out))
}

fn base_row(obs: &Observation<'_>, config: &EnrichConfig) -> Row {
    let mut row = obs.row.clone();
    row.set(
        &config.date_column,
        obs.date.map_or(Value::Null, Value::Timestamp),
    );
    if obs.value.is_none() {
        row.set(&config.value_column, Value::Null);
    }
    row
}

fn derive_row(
    obs: &Observation<'_>,
    i: usize,
    values: &[Option<f64>],
    config: &EnrichConfig,
) -> Row {
    let mut row = base_row(obs, config);
    for &p in &config.lag_periods {
        let (change, pct) = lagged(values, i, p);
        row.set(&change_column(p), Value::from_f64(change));
        row.set(&change_pct_column(p), Value::from_f64(pct));
    }
    for &w in &config.rolling_windows {
        row.set(&avg_column(w), Value::from_f64(trailing_mean(values, i, w)));
    }
    row
}

fn null_row(obs: &Observation<'_>, config: &EnrichConfig) -> Row {
    let mut row = base_row(obs, config);
    for col in config.derived_columns() {
        row.set(&col, Value::Null);
    }
    row
}

/// Difference and percent change against the value `period` rows earlier.
pub fn lagged(values: &[Option<f64>], i: usize, period: usize) -> (Option<f64>, Option<f64>) {
    if i < period {
        return (None, None);
    }
    match (values[i], values[i - period]) {
        (Some(curr), Some(prev)) => {
            let pct = (prev != 0.0).then(|| 100.0 * (curr / prev - 1.0));
            (Some(curr - prev), pct)
        }
        _ => (None, None),
    }
}

/// Mean of the non-null values among the trailing `window` rows ending at `i`.
pub fn trailing_mean(values: &[Option<f64>], i: usize, window: usize) -> Option<f64> {
    let lo = (i + 1).saturating_sub(window);
    let (sum, n) = values[lo..=i]
        .iter()
        .flatten()
        .fold((0.0_f64, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn value_row(player: &str, date: &str, value: f64) -> Row {
        Row::new()
            .with("player_name", player)
            .with("date", date)
            .with("market_value_eur", value)
    }

    fn float(row: &Row, col: &str) -> Option<f64> {
        match row.get(col) {
            Value::Float(f) => Some(*f),
            Value::Null => None,
            other => panic!("unexpected value in {col}: {other:?}"),
        }
    }

    fn date_str(row: &Row) -> String {
        row.get("date").to_string()
    }

    #[test]
    fn empty_table_is_a_no_op() {
        let out = enrich(&Table::empty(), &EnrichConfig::default()).unwrap();
        assert!(out.is_empty());
        assert!(out.columns().is_empty());
    }

    #[test]
    fn missing_column_is_a_schema_error() {
        let table = Table::from_rows(vec![
            Row::new().with("player_name", "A").with("date", "2024-01-01"),
        ]);
        match enrich(&table, &EnrichConfig::default()) {
            Err(AnalyticsError::Schema { column }) => assert_eq!(column, "market_value_eur"),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn sorts_and_differences_within_player() {
        let table = Table::from_rows(vec![
            value_row("A", "2024-01-03", 30.0),
            value_row("A", "2024-01-01", 10.0),
            value_row("A", "2024-01-02", 20.0),
        ]);
        let out = enrich(&table, &EnrichConfig::default()).unwrap();
        let dates: Vec<String> = out.rows().iter().map(date_str).collect();
        assert_eq!(dates, vec!["2024-01-03", "2024-01-02", "2024-01-01"]);

        assert_eq!(float(&out.rows()[0], "value_change_1"), Some(10.0));
        assert_eq!(float(&out.rows()[1], "value_change_1"), Some(10.0));
        assert_eq!(float(&out.rows()[2], "value_change_1"), None);
        assert_relative_eq!(float(&out.rows()[1], "value_change_1_pct").unwrap(), 100.0);
        assert_relative_eq!(float(&out.rows()[0], "value_change_1_pct").unwrap(), 50.0);
    }

    #[test]
    fn rolling_window_shrinks_at_start() {
        let table = Table::from_rows(vec![
            value_row("A", "2024-01-01", 10.0),
            value_row("A", "2024-01-02", 20.0),
            value_row("A", "2024-01-03", 60.0),
        ]);
        let config = EnrichConfig {
            lag_periods: vec![],
            rolling_windows: vec![7],
            ..EnrichConfig::default()
        };
        let out = enrich(&table, &config).unwrap();
        assert_relative_eq!(float(&out.rows()[0], "value_avg_7").unwrap(), 30.0);
        assert_relative_eq!(float(&out.rows()[2], "value_avg_7").unwrap(), 10.0);
    }

    #[test]
    fn rolling_window_slides_after_filling() {
        let values: Vec<Option<f64>> = (1..=5).map(|v| Some(v as f64)).collect();
        assert_relative_eq!(trailing_mean(&values, 4, 2).unwrap(), 4.5);
        assert_relative_eq!(trailing_mean(&values, 1, 3).unwrap(), 1.5);
    }

    #[test]
    fn insufficient_history_gives_null_lags() {
        let table = Table::from_rows(vec![
            value_row("A", "2024-01-01", 10.0),
            value_row("A", "2024-01-02", 12.0),
        ]);
        let out = enrich(&table, &EnrichConfig::default()).unwrap();
        let latest = &out.rows()[0];
        assert_eq!(float(latest, "value_change_1"), Some(2.0));
        assert_eq!(float(latest, "value_change_7"), None);
        assert_eq!(float(latest, "value_change_30"), None);
        assert_eq!(float(latest, "value_change_7_pct"), None);
    }

    #[test]
    fn zero_prior_value_gives_null_pct() {
        let table = Table::from_rows(vec![
            value_row("A", "2024-01-01", 0.0),
            value_row("A", "2024-01-02", 5.0),
        ]);
        let out = enrich(&table, &EnrichConfig::default()).unwrap();
        assert_eq!(float(&out.rows()[0], "value_change_1"), Some(5.0));
        assert_eq!(float(&out.rows()[0], "value_change_1_pct"), None);
    }

    #[test]
    fn later_rows_do_not_affect_earlier_features() {
        let mut rows = vec![
            value_row("A", "2024-01-01", 10.0),
            value_row("A", "2024-01-02", 15.0),
            value_row("A", "2024-01-03", 40.0),
        ];
        let before = enrich(&Table::from_rows(rows.clone()), &EnrichConfig::default()).unwrap();
        rows[2] = value_row("A", "2024-01-03", 9999.0);
        let after = enrich(&Table::from_rows(rows), &EnrichConfig::default()).unwrap();

        for col in ["value_change_1", "value_change_1_pct", "value_avg_7"] {
            assert_eq!(before.rows()[1].get(col), after.rows()[1].get(col));
            assert_eq!(before.rows()[2].get(col), after.rows()[2].get(col));
        }
    }

    #[test]
    fn players_are_ordered_by_name_then_date_descending() {
        let table = Table::from_rows(vec![
            value_row("Pedri", "2024-01-01", 1.0),
            value_row("Araujo", "2024-01-02", 2.0),
            value_row("Pedri", "2024-01-02", 3.0),
            value_row("Araujo", "2024-01-01", 4.0),
        ]);
        let out = enrich(&table, &EnrichConfig::default()).unwrap();
        let order: Vec<(String, String)> = out
            .rows()
            .iter()
            .map(|r| (r.get("player_name").to_string(), date_str(r)))
            .collect();
        assert_eq!(
            order,
            vec![
                ("Araujo".to_string(), "2024-01-02".to_string()),
                ("Araujo".to_string(), "2024-01-01".to_string()),
                ("Pedri".to_string(), "2024-01-02".to_string()),
                ("Pedri".to_string(), "2024-01-01".to_string()),
            ]
        );
        // Araujo went 4 -> 2
        assert_eq!(float(&out.rows()[0], "value_change_1"), Some(-2.0));
    }

    #[test]
    fn unparseable_date_is_kept_with_null_features() {
        let table = Table::from_rows(vec![
            value_row("A", "2024-01-01", 10.0),
            value_row("A", "yesterday", 99.0),
            value_row("A", "2024-01-02", 20.0),
        ]);
        let out = enrich(&table, &EnrichConfig::default()).unwrap();
        assert_eq!(out.len(), 3);
        let last = &out.rows()[2];
        assert!(last.get("date").is_null());
        assert_eq!(float(last, "value_avg_7"), None);
        // the undated row does not count as a prior observation
        assert_eq!(float(&out.rows()[0], "value_change_1"), Some(10.0));
    }

    #[test]
    fn bad_numeric_cell_degrades_to_null() {
        let table = Table::from_rows(vec![
            value_row("A", "2024-01-01", 10.0),
            Row::new()
                .with("player_name", "A")
                .with("date", "2024-01-02")
                .with("market_value_eur", "n/a"),
            value_row("A", "2024-01-03", 30.0),
        ]);
        let out = enrich(&table, &EnrichConfig::default()).unwrap();
        let middle = &out.rows()[1];
        assert!(middle.get("market_value_eur").is_null());
        assert_eq!(float(middle, "value_change_1"), None);
        assert_relative_eq!(float(middle, "value_avg_7").unwrap(), 10.0);
        let newest = &out.rows()[0];
        assert_eq!(float(newest, "value_change_1"), None);
        assert_eq!(float(newest, "value_change_1_pct"), None);
        assert_relative_eq!(float(newest, "value_avg_7").unwrap(), 20.0);
    }

    #[test]
    fn rows_without_player_go_last() {
        let table = Table::from_rows(vec![
            Row::new().with("date", "2024-01-01").with("market_value_eur", 5.0),
            value_row("Zubimendi", "2024-01-01", 1.0),
        ]);
        let out = enrich(&table, &EnrichConfig::default()).unwrap();
        assert_eq!(out.rows()[0].get("player_name"), &Value::from("Zubimendi"));
        assert!(out.rows()[1].get("player_name").is_null());
    }

    #[test]
    fn duplicate_dates_keep_input_order_for_lags() {
        let table = Table::from_rows(vec![
            value_row("A", "2024-01-01", 10.0),
            value_row("A", "2024-01-01", 11.0),
        ]);
        let out = enrich(&table, &EnrichConfig::default()).unwrap();
        // ascending order is [10, 11]; the second copy diffs against the first
        let with_lag: Vec<&Row> = out
            .rows()
            .iter()
            .filter(|r| !r.get("value_change_1").is_null())
            .collect();
        assert_eq!(with_lag.len(), 1);
        assert_eq!(with_lag[0].get("market_value_eur"), &Value::Float(11.0));
    }

    #[test]
    fn derived_columns_are_appended_to_schema() {
        let table = Table::from_rows(vec![value_row("A", "2024-01-01", 1.0)]);
        let out = enrich(&table, &EnrichConfig::default()).unwrap();
        assert_eq!(
            &out.columns()[3..],
            &[
                "value_change_1",
                "value_change_1_pct",
                "value_change_7",
                "value_change_7_pct",
                "value_change_30",
                "value_change_30_pct",
                "value_avg_7",
                "value_avg_14",
                "value_avg_30",
            ]
        );
    }

    #[test]
    fn zero_window_is_rejected() {
        let table = Table::from_rows(vec![value_row("A", "2024-01-01", 1.0)]);
        let config = EnrichConfig {
            rolling_windows: vec![0],
            ..EnrichConfig::default()
        };
        assert!(matches!(
            enrich(&table, &config),
            Err(AnalyticsError::InvalidRequest { .. })
        ));
    }
}
