//! Declarative chart descriptions handed to the renderer.
//!
//! Nothing here draws anything. The builders validate and shape table data
//! into serializable specs: a position-coloured scatter with highlight layers
//! and tertile guides, and a per-player line chart of a value over time.

use crate::domain::error::AnalyticsError;
use crate::domain::snapshot::{round2, POSITION_LABELS};
use crate::domain::table::Table;
use crate::domain::value::Value;
use chrono::{Duration, NaiveDateTime};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};

pub const POSITION_COLOURS: [(&str, &str); 4] = [
    ("1 - Portero", "rgb(253, 216, 53)"),
    ("2 - Defensa", "rgb(30, 136, 229)"),
    ("3 - Centrocampista", "rgb(67, 160, 71)"),
    ("4 - Delantero", "rgb(244, 81, 30)"),
];

const GUIDE_COLOUR: &str = "rgb(248, 196, 113)";
const TERTILES: [f64; 2] = [0.33, 0.67];
const EMPTY_SCATTER_NOTE: &str = "No data to display with the current filters";
const EMPTY_LINE_NOTE: &str = "No time-series data available";

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartSpec {
    Scatter(ScatterChart),
    Line(LineChart),
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Highlight {
    CurrentTeam,
    Extra,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Guide {
    pub axis: Axis,
    pub value: f64,
    pub colour: String,
    pub dash: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScatterPoint {
    pub label: Option<String>,
    pub category: Option<String>,
    pub x: f64,
    pub y: f64,
    pub highlight: Option<Highlight>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScatterChart {
    pub x_metric: String,
    pub y_metric: String,
    pub x_title: String,
    pub y_title: String,
    pub legend_title: String,
    pub height: u32,
    pub category_order: Vec<String>,
    pub colours: BTreeMap<String, String>,
    pub points: Vec<ScatterPoint>,
    pub guides: Vec<Guide>,
    pub annotation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScatterOptions {
    pub x_metric: String,
    pub y_metric: String,
    pub category_column: String,
    pub label_column: String,
    pub current_team: Vec<String>,
    pub extra_highlight: Vec<String>,
    pub show_tertiles: bool,
    pub height: u32,
}

impl ScatterOptions {
    pub fn new(x_metric: &str, y_metric: &str) -> Self {
        Self {
            x_metric: x_metric.to_string(),
            y_metric: y_metric.to_string(),
            category_column: "position".into(),
            label_column: "player_name".into(),
            current_team: Vec::new(),
            extra_highlight: Vec::new(),
            show_tertiles: true,
            height: 600,
        }
    }
}

/// `market_purchases_pct` -> `Market Purchases Pct`
pub fn axis_title(metric: &str) -> String {
    metric
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Linear-interpolated quantile of already sorted values.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

fn tertile_guides(axis: Axis, mut values: Vec<f64>) -> Vec<Guide> {
    values.sort_by(f64::total_cmp);
    TERTILES
        .iter()
        .filter_map(|q| quantile(&values, *q))
        .filter(|v| v.is_finite())
        .map(|value| Guide {
            axis,
            value,
            colour: GUIDE_COLOUR.into(),
            dash: "dash".into(),
        })
        .collect()
}

pub fn build_scatter(table: &Table, opts: &ScatterOptions) -> Result<ChartSpec, AnalyticsError> {
    let mut chart = ScatterChart {
        x_metric: opts.x_metric.clone(),
        y_metric: opts.y_metric.clone(),
        x_title: axis_title(&opts.x_metric),
        y_title: axis_title(&opts.y_metric),
        legend_title: "Posición".into(),
        height: opts.height,
        category_order: POSITION_LABELS.iter().map(|(_, l)| l.to_string()).collect(),
        colours: POSITION_COLOURS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        points: Vec::new(),
        guides: Vec::new(),
        annotation: None,
    };

    if table.is_empty() {
        chart.annotation = Some(EMPTY_SCATTER_NOTE.into());
        return Ok(ChartSpec::Scatter(chart));
    }
    table.require_columns(&[opts.x_metric.as_str(), opts.y_metric.as_str()])?;

    let current: HashSet<&str> = opts.current_team.iter().map(String::as_str).collect();
    let extra: HashSet<&str> = opts.extra_highlight.iter().map(String::as_str).collect();

    for row in table.rows() {
        let (Some(x), Some(y)) = (
            row.get(&opts.x_metric).as_f64(),
            row.get(&opts.y_metric).as_f64(),
        ) else {
            continue;
        };
        let label = row.get(&opts.label_column).key_string();
        let highlight = label.as_deref().and_then(|name| {
            if current.contains(name) {
                Some(Highlight::CurrentTeam)
            } else if extra.contains(name) {
                Some(Highlight::Extra)
            } else {
                None
            }
        });
        chart.points.push(ScatterPoint {
            label,
            category: row.get(&opts.category_column).key_string(),
            x: round2(x),
            y: round2(y),
            highlight,
        });
    }

    if opts.show_tertiles {
        chart
            .guides
            .extend(tertile_guides(Axis::X, chart.points.iter().map(|p| p.x).collect()));
        chart
            .guides
            .extend(tertile_guides(Axis::Y, chart.points.iter().map(|p| p.y).collect()));
    }
    if chart.points.is_empty() {
        chart.annotation = Some(EMPTY_SCATTER_NOTE.into());
    }

    Ok(ChartSpec::Scatter(chart))
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LinePoint {
    #[serde(serialize_with = "serialize_date")]
    pub date: NaiveDateTime,
    pub value: f64,
}

/// Same text as a timestamp cell in an exported table.
fn serialize_date<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&Value::Timestamp(*date))
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<LinePoint>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LineChart {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub legend_title: String,
    pub height: u32,
    pub markers: bool,
    pub reference_line: f64,
    pub series: Vec<LineSeries>,
    pub annotation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LineOptions {
    pub title: String,
    pub date_column: String,
    pub value_column: String,
    pub player_column: String,
    pub players: Vec<String>,
    pub days_back: Option<i64>,
    pub height: u32,
}

impl LineOptions {
    pub fn new(value_column: &str) -> Self {
        Self {
            title: "Evolución del valor de mercado".into(),
            date_column: "date".into(),
            value_column: value_column.to_string(),
            player_column: "player_name".into(),
            players: Vec::new(),
            days_back: None,
            height: 420,
        }
    }
}

/// One line per player, oldest point first.
///
/// With `days_back`, only points within that many days of the newest date in
/// the table are kept. Rows with an unparseable date or value are skipped.
pub fn build_line(table: &Table, opts: &LineOptions) -> Result<ChartSpec, AnalyticsError> {
    let mut chart = LineChart {
        title: format!("{}: {}", opts.title, opts.value_column),
        x_title: "Fecha".into(),
        y_title: "Valor".into(),
        legend_title: "Jugador".into(),
        height: opts.height,
        markers: opts.days_back != Some(365),
        reference_line: 0.0,
        series: Vec::new(),
        annotation: None,
    };

    if !table.is_empty() {
        table.require_columns(&[
            opts.date_column.as_str(),
            opts.value_column.as_str(),
            opts.player_column.as_str(),
        ])?;
    }

    let wanted: HashSet<&str> = opts.players.iter().map(String::as_str).collect();
    let mut points: Vec<(String, LinePoint)> = table
        .rows()
        .iter()
        .filter_map(|row| {
            let date = row.get(&opts.date_column).as_timestamp()?;
            let value = row.get(&opts.value_column).as_f64()?;
            let name = row.get(&opts.player_column).key_string()?;
            Some((name, LinePoint { date, value }))
        })
        .filter(|(name, _)| wanted.is_empty() || wanted.contains(name.as_str()))
        .collect();

    let newest = points.iter().map(|(_, p)| p.date).max();
    if let (Some(days), Some(newest)) = (opts.days_back, newest) {
        let cutoff = newest - Duration::days(days);
        points.retain(|(_, p)| p.date >= cutoff);
    }

    let mut by_player: BTreeMap<String, Vec<LinePoint>> = BTreeMap::new();
    for (name, point) in points {
        by_player.entry(name).or_default().push(point);
    }
    chart.series = by_player
        .into_iter()
        .map(|(name, mut points)| {
            points.sort_by_key(|p| p.date);
            LineSeries { name, points }
        })
        .collect();

    if chart.series.is_empty() {
        chart.annotation = Some(EMPTY_LINE_NOTE.into());
    }
    Ok(ChartSpec::Line(chart))
}
